//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `library_core` linkage and store configuration.
//! - Print per-collection document counts for the configured store.

use library_core::{
    Book, DataAccess, LogSettings, Loan, SqliteDataAccess, StoreConfig, StoreLocation, User,
};
use std::process::ExitCode;

fn main() -> ExitCode {
    println!("library_core ping={}", library_core::ping());
    println!("library_core version={}", library_core::core_version());

    match LogSettings::from_env() {
        Ok(Some(settings)) => {
            if let Err(err) = library_core::logging::init_with(settings) {
                eprintln!("logging disabled: {err}");
            }
        }
        Ok(None) => {}
        Err(err) => eprintln!("logging disabled: {err}"),
    }

    let config = match StoreConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };
    match config.location() {
        StoreLocation::File(path) => println!("store={}", path.display()),
        StoreLocation::Memory => println!("store=memory"),
    }

    let data = match SqliteDataAccess::open(&config) {
        Ok(data) => data,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    let counts = data.count::<Book>().and_then(|books| {
        Ok((books, data.count::<User>()?, data.count::<Loan>()?))
    });
    match counts {
        Ok((books, users, loans)) => {
            println!("books={books} users={users} loans={loans}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            log::error!("event=cli_counts module=cli status=error error={err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
