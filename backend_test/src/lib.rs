use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{
    parse::Parser, punctuated::Punctuated, spanned::Spanned, FnArg, Ident, ItemFn, Pat,
    Signature, Token, Type,
};

/// Transform an asynchronous test into a synchronous one, inject dependencies,
/// and ensure that the test database is dropped regardless of how the test terminates.
///
/// Every test gets a fresh in-memory store, or with `#[backend_test(mongodb)]`
/// a fresh database on the MongoDB server named by `ROCKET_DB_URI`. MongoDB
/// tests are skipped when that variable is unset. Injectable dependencies are
/// [`rocket::local::asynchronous::Client`], [`crate::store::Storage`] and,
/// when the test is also marked `admin` or `voter`, a `rocket::http::Cookie`
/// holding an auth token for a freshly created user of that kind.
#[proc_macro_attribute]
pub fn backend_test(args: TokenStream, input: TokenStream) -> TokenStream {
    let mut item_fn = match syn::parse::<ItemFn>(input) {
        Ok(item_fn) => item_fn,
        Err(err) => return err.into_compile_error().into(),
    };

    // Work out the backend and who to log in as, if anyone.
    let args = match Punctuated::<Ident, Token![,]>::parse_terminated.parse(args) {
        Ok(args) => args,
        Err(err) => return err.into_compile_error().into(),
    };
    let mut use_mongodb = false;
    let mut example_user = None;
    for arg in &args {
        if arg == "mongodb" && !use_mongodb {
            use_mongodb = true;
        } else if arg == "admin" && example_user.is_none() {
            example_user = Some(quote! { admin_example });
        } else if arg == "voter" && example_user.is_none() {
            example_user = Some(quote! { voter_example });
        } else {
            return syn::Error::new(
                arg.span(),
                "Expected `mongodb` and/or one of `admin` or `voter`",
            )
            .into_compile_error()
            .into();
        }
    }

    // Extract type information and reject invalid function signatures.
    let test_args = match check_sig(item_fn.sig.clone(), example_user.is_some()) {
        Ok(args) => args,
        Err(err) => {
            return err.into_compile_error().into();
        }
    };

    // Rename the future so the test can have its original name.
    let name = item_fn.sig.ident.clone();
    let new_name = format_ident!("{}_fut", name);
    item_fn.sig.ident = new_name.clone();

    // Log in as admin/voter if needed.
    let maybe_login = match example_user {
        Some(example) => quote! {
            let (_, auth_cookie) = crate::api::test_utils::login(
                &rocket_client,
                &storage,
                crate::model::db::user::UserCore::#example(),
            )
            .await;
            let auth_cookie = Some(auth_cookie);
        },
        None => quote! {
            let auth_cookie: Option<rocket::http::Cookie<'static>> = None;
        },
    };

    // Pick the storage backend.
    let make_storage = if use_mongodb {
        quote! {
            let (storage, db) = crate::mongo_test_storage().await?;
            let db = Some(db);
        }
    } else {
        quote! {
            let storage = crate::store::Storage::memory();
            let db: Option<mongodb::Database> = None;
        }
    };

    // Rewrite the test function.
    quote! {
        #[test]
        fn #name() {
            /// Test setup. `None` means the test cannot run here.
            async fn setup() -> Option<(
                rocket::local::asynchronous::Client,
                crate::store::Storage,
                Option<rocket::http::Cookie<'static>>,
                Option<mongodb::Database>,
            )> {
                #make_storage
                let rocket_client = rocket::local::asynchronous::Client::tracked(
                    crate::rocket_for_storage(crate::test_figment(), storage.clone()),
                )
                .await
                .unwrap();

                #maybe_login

                Some((rocket_client, storage, auth_cookie, db))
            }

            /// The test itself.
            #item_fn

            /// Test cleanup.
            async fn cleanup(db: Option<mongodb::Database>) {
                if let Some(db) = db {
                    db.drop(None).await.unwrap();
                }
            }

            // Create an async runtime. We need a separate one for inside and
            // outside the `catch_unwind`.
            let outer_runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("test-setup")
                .worker_threads(1)
                .enable_all()
                .build()
                .unwrap();
            let inner_runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("rocket-worker-test-thread")
                .worker_threads(2)
                .enable_all()
                .build()
                .unwrap();

            // Run the setup.
            let Some((rocket_client, storage, auth_cookie, db)) = outer_runtime.block_on(setup()) else {
                return;
            };

            // Run the test, catching any panics.
            // Use mutexes to safely transfer `!UnwindSafe` data.
            let client_mutex = std::sync::Mutex::new(rocket_client);
            let storage_mutex = std::sync::Mutex::new(storage);
            let cookie_mutex = std::sync::Mutex::new(auth_cookie);
            let runtime_mutex = std::sync::Mutex::new(inner_runtime);
            let result = std::panic::catch_unwind(|| {
                let rocket_client = client_mutex.into_inner().unwrap();
                let storage = storage_mutex.into_inner().unwrap();
                #[allow(unused_variables)]
                let auth_cookie = cookie_mutex.into_inner().unwrap();
                let runtime = runtime_mutex.lock().unwrap();

                runtime.block_on(#new_name(#(#test_args),*));
            });

            // Run the cleanup: stop anything the test left running, then
            // drop the database.
            let inner_runtime = runtime_mutex
                .into_inner()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            inner_runtime.shutdown_timeout(std::time::Duration::from_secs(5));
            outer_runtime.block_on(cleanup(db));

            // If the test panicked, re-raise the panic.
            if let Err(cause) = result {
                std::panic::panic_any(cause);
            }
        }
    }
    .into()
}

/// Ensure the wrapped test is async, extract parameters to inject, and reject unknown parameters.
fn check_sig(sig: Signature, logged_in: bool) -> Result<Vec<TokenStream2>, syn::Error> {
    if sig.asyncness.is_none() {
        return Err(syn::Error::new(sig.span(), "Test must be marked `async`"));
    }

    let mut has_client = false;
    let mut has_storage = false;
    let mut has_cookie = false;
    let mut args = vec![];

    for input in &sig.inputs {
        if let FnArg::Typed(pat_type) = input {
            if let Pat::Ident(_) = &*pat_type.pat {
                if let Type::Path(type_path) = &*pat_type.ty {
                    // Valid as the last path segment for any type is itself.
                    let type_ident = &type_path.path.segments.last().unwrap().ident;
                    if type_ident == "Client" {
                        if has_client {
                            return Err(syn::Error::new(input.span(), "Test cannot accept more than one `rocket::local::asynchronous::Client`"));
                        }
                        has_client = true;
                        args.push(quote! { rocket_client });
                        continue;
                    } else if type_ident == "Storage" {
                        if has_storage {
                            return Err(syn::Error::new(
                                input.span(),
                                "Test cannot accept more than one `Storage`",
                            ));
                        }
                        has_storage = true;
                        args.push(quote! { storage });
                        continue;
                    } else if type_ident == "Cookie" {
                        if !logged_in {
                            return Err(syn::Error::new(
                                input.span(),
                                "An auth `Cookie` needs the `admin` or `voter` argument",
                            ));
                        }
                        if has_cookie {
                            return Err(syn::Error::new(
                                input.span(),
                                "Test cannot accept more than one auth `Cookie`",
                            ));
                        }
                        has_cookie = true;
                        args.push(quote! { auth_cookie.unwrap() });
                        continue;
                    }
                }
            }
        }

        return Err(syn::Error::new(
            input.span(),
            "Expected one of `client_ident: Client`, `storage_ident: Storage` or `auth_ident: Cookie<'static>`",
        ));
    }

    Ok(args)
}
