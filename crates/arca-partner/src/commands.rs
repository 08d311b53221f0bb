//! The partner tool commands.

use colored::Colorize;

use arca_workers::s3::ObjectStore;
use arca_workers::WorkerError;

use crate::options::Options;
use crate::{EXIT_ITEM_NOT_FOUND, EXIT_OK, EXIT_RUNTIME_ERR};

fn store_for(opts: &Options) -> ObjectStore {
    ObjectStore::with_credentials(
        &opts.access_key_id,
        &opts.secret_access_key,
        opts.s3_endpoint.clone(),
        100 * 1024 * 1024,
    )
}

fn print_runtime_error(error: &WorkerError) -> i32 {
    eprintln!("{}", error);
    let message = error.to_string();
    if message.contains("AccessDenied") {
        eprintln!(
            "Be sure the bucket and key name are correct. The store may \
             report 'Access Denied' for buckets that don't exist."
        );
    }
    if message.contains("NoSuchKey") || message.contains("NotFound") {
        return EXIT_ITEM_NOT_FOUND;
    }
    EXIT_RUNTIME_ERR
}

/// Delete one or more keys from the bucket.
///
/// Note that deleting a key that does not exist reports success; the
/// underlying store does not distinguish that case.
pub async fn delete(opts: &Options, keys: &[String]) -> i32 {
    let store = store_for(opts);
    for key in keys {
        if let Err(e) = store.delete(&opts.region, &opts.bucket, key).await {
            return print_runtime_error(&e);
        }
        println!("{} {}", "deleted".green(), key);
    }
    EXIT_OK
}

/// Show what the store knows about a key.
pub async fn head(opts: &Options, key: &str) -> i32 {
    let store = store_for(opts);
    match store.head(&opts.region, &opts.bucket, key).await {
        Ok(Some(info)) => {
            println!("{}: {}", "key".bold(), key);
            println!("{}: {}", "size".bold(), info.size);
            println!("{}: {}", "etag".bold(), info.etag);
            let mut names: Vec<&String> = info.metadata.keys().collect();
            names.sort();
            for name in names {
                println!("{}: {}", name.bold(), info.metadata[name]);
            }
            if let Some(restore) = info.restore {
                println!("{}: {:?}", "restore".bold(), restore);
            }
            EXIT_OK
        }
        Ok(None) => {
            eprintln!("Key '{}' does not exist in bucket '{}'", key, opts.bucket);
            EXIT_ITEM_NOT_FOUND
        }
        Err(e) => print_runtime_error(&e),
    }
}

/// List keys in the bucket, optionally under a prefix.
pub async fn list(opts: &Options, prefix: &str, limit: i32) -> i32 {
    let store = store_for(opts);
    match store
        .list_keys(&opts.region, &opts.bucket, prefix, Some(limit))
        .await
    {
        Ok(keys) => {
            for key in keys {
                println!("{}", key);
            }
            EXIT_OK
        }
        Err(e) => print_runtime_error(&e),
    }
}
