mod archive;
mod cli;
mod commands;
mod env_loader;
mod error;
mod logging;

use error::SyncError;

fn main() {
    env_loader::load_dotenv();

    match cli::run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            match err.downcast_ref::<SyncError>() {
                Some(typed) => eprintln!("error[{}]: {err:#}", typed.code().as_str()),
                None => eprintln!("error: {err:#}"),
            }
            std::process::exit(2);
        }
    }
}
