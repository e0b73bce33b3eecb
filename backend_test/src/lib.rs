use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{parse_macro_input, spanned::Spanned, FnArg, Ident, ItemFn, Pat, Signature, Type};

/// Transform an asynchronous test into a synchronous one, inject dependencies,
/// and ensure that any test database is dropped regardless of how the test terminates.
///
/// Injectable dependencies are [`rocket::local::asynchronous::Client`] and
/// `crate::engine::ElectionEngine`; the client serves the injected engine.
///
/// By default the engine runs on the in-memory store. `#[backend_test(mongo)]`
/// runs it on a fresh database in the MongoDB named by `TEST_DB_URI` instead,
/// and skips the test when that variable is unset.
#[proc_macro_attribute]
pub fn backend_test(args: TokenStream, input: TokenStream) -> TokenStream {
    let mut item_fn = parse_macro_input!(input as ItemFn);

    // Extract type information and reject invalid function signatures.
    let test_args = match check_sig(item_fn.sig.clone()) {
        Ok(args) => args,
        Err(err) => {
            return err.into_compile_error().into();
        }
    };

    let use_mongo = match parse_macro_input!(args as Option<Ident>) {
        None => false,
        Some(arg) if arg == "mongo" => true,
        Some(arg) => {
            return syn::Error::new(arg.span(), "Expected no argument or `mongo`")
                .into_compile_error()
                .into();
        }
    };

    // Rename the future so the test can have its original name.
    let name = item_fn.sig.ident.clone();
    let new_name = format_ident!("{}_fut", name);
    item_fn.sig.ident = new_name.clone();

    let make_engine = if use_mongo {
        quote! {
            let (engine, db) = crate::test_support::mongo_engine().await?;
            let db = Some(db);
        }
    } else {
        quote! {
            let engine = crate::test_support::memory_engine();
            let db: Option<::mongodb::Database> = None;
        }
    };

    // Rewrite the test function.
    quote! {
        #[test]
        fn #name() {
            /// Test setup.
            async fn setup() -> Option<(
                rocket::local::asynchronous::Client,
                crate::engine::ElectionEngine,
                Option<::mongodb::Database>,
            )> {
                #make_engine
                let rocket_client = crate::test_support::client_for(engine.clone()).await;
                Some((rocket_client, engine, db))
            }

            /// The test itself.
            #item_fn

            /// Test cleanup.
            async fn cleanup(db: Option<::mongodb::Database>) {
                if let Some(db) = db {
                    db.drop(None).await.unwrap();
                }
            }

            log4rs_test_utils::test_logging::init_logging_once_for(
                ["election_engine"],
                None,
                None,
            );

            // Create an async runtime. We need a separate one for inside and
            // outside the `catch_unwind`. The inner one has several workers so
            // that spawned tasks really do race.
            let outer_runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("test-setup-cleanup")
                .worker_threads(1)
                .enable_all()
                .build()
                .unwrap();
            let inner_runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("rocket-worker-test-thread")
                .worker_threads(4)
                .enable_all()
                .build()
                .unwrap();

            // Run the setup.
            let Some((rocket_client, engine, db)) = outer_runtime.block_on(setup()) else {
                eprintln!(
                    "skipping {}: {} is not set",
                    stringify!(#name),
                    crate::test_support::TEST_DB_URI,
                );
                return;
            };

            // Run the test, catching any panics.
            // Use mutexes to safely transfer `!UnwindSafe` data.
            let client_mutex = std::sync::Mutex::new(rocket_client);
            let engine_mutex = std::sync::Mutex::new(engine);
            let runtime_mutex = std::sync::Mutex::new(inner_runtime);
            let result = std::panic::catch_unwind(|| {
                let rocket_client = client_mutex.into_inner().unwrap();
                let engine = engine_mutex.into_inner().unwrap();
                let runtime = runtime_mutex.into_inner().unwrap();

                runtime.block_on(#new_name(#(#test_args),*));
            });

            // Run the cleanup.
            outer_runtime.block_on(cleanup(db));

            // If the test panicked, re-raise the panic.
            if let Err(cause) = result {
                std::panic::resume_unwind(cause);
            }
        }
    }
    .into()
}

/// Ensure the wrapped test is async, extract parameters to inject, and reject unknown parameters.
fn check_sig(sig: Signature) -> Result<Vec<TokenStream2>, syn::Error> {
    if sig.asyncness.is_none() {
        return Err(syn::Error::new(sig.span(), "Test must be marked `async`"));
    }

    let mut has_client = false;
    let mut has_engine = false;
    let mut args = vec![];

    for input in &sig.inputs {
        if let FnArg::Typed(pat_type) = input {
            if let Pat::Ident(_) = &*pat_type.pat {
                if let Type::Path(type_path) = &*pat_type.ty {
                    if let Some(type_ident) = type_path.path.get_ident() {
                        if type_ident == "Client" {
                            if has_client {
                                return Err(syn::Error::new(input.span(), "Test cannot accept more than one `rocket::local::asynchronous::Client`"));
                            }
                            has_client = true;
                            args.push(quote! { rocket_client });
                            continue;
                        } else if type_ident == "ElectionEngine" {
                            if has_engine {
                                return Err(syn::Error::new(
                                    input.span(),
                                    "Test cannot accept more than one `ElectionEngine`",
                                ));
                            }
                            has_engine = true;
                            args.push(quote! { engine });
                            continue;
                        }
                    }
                }
            }
        }

        return Err(syn::Error::new(
            input.span(),
            "Expected one of `client_ident: Client` or `engine_ident: ElectionEngine`",
        ));
    }

    Ok(args)
}
