mod analyze;
mod execute;
mod generate;

use std::error::Error;

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

pub use analyze::Analyze;
pub use execute::Execute;
pub use generate::Generate;

/// Logs go to stderr so generated code printed on stdout stays clean.
fn init_logging(debug: bool) -> Result<(), Box<dyn Error>> {
    let level = match debug {
        true => Level::DEBUG,
        false => Level::WARN,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
