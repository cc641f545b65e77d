//! Manual smoke-test harness for the driver, in the spirit of the upstream
//! project's own `drivertest` binary: connect, copy a remote object
//! down, copy it back up under a new key, read it back through `fopen`/
//! `fseek`/`fread`, then clean up. Unlike the upstream harness this runs
//! in-process against the crate's `rlib` rather than `dlopen`-ing the
//! `cdylib` — there is only one build of the driver logic either way.

use clap::Parser;
use khiops_s3_driver::driver::DriverState;
use khiops_s3_driver::reader::Whence;
use khiops_s3_driver::DriverError;
use std::process::ExitCode;

fn version_long() -> &'static str {
    static V: std::sync::OnceLock<String> = std::sync::OnceLock::new();
    V.get_or_init(|| format!("{} (built {})", env!("CARGO_PKG_VERSION"), env!("DGP_BUILD_TIME")))
}

/// Smoke-tests a connected driver against a live bucket: copy down, copy
/// back up under a new key, read back through fopen/fseek/fread, clean up.
#[derive(Parser, Debug)]
#[command(name = "driver-test-cli")]
#[command(version = version_long())]
#[command(author, about, long_about = None)]
struct Cli {
    /// Source object URI to read, e.g. s3://bucket/input.csv
    input_uri: String,

    /// Destination object URI to write the round-tripped copy to
    output_uri: String,

    /// Local scratch file path used for the copyToLocal/copyFromLocal leg
    local_path: String,

    /// Bytes requested per fread call while verifying the round-trip
    #[arg(short, long, default_value_t = 64 * 1024)]
    buffer_size: usize,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let runtime = tokio::runtime::Runtime::new().expect("failed to build tokio runtime");
    match runtime.block_on(run(&cli)) {
        Ok(()) => {
            println!("! Test is successful !");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("ERROR: {e}");
            println!("Test has failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<(), DriverError> {
    let driver = DriverState::new();
    driver.connect().await?;
    if !driver.is_connected() {
        return Err(DriverError::NotConnected);
    }

    if !driver.file_exists(&cli.input_uri).await? {
        driver.disconnect().await?;
        return Err(DriverError::InvalidArgument(format!(
            "input object is missing: {}",
            cli.input_uri
        )));
    }
    println!(
        "Test of the driver library '{}' version '{}'",
        khiops_s3_driver::driver::DRIVER_NAME,
        env!("CARGO_PKG_VERSION")
    );

    let size = driver.get_file_size(&cli.input_uri).await?;
    println!("{} is {size} bytes", cli.input_uri);

    driver.copy_to_local(&cli.input_uri, &cli.local_path).await?;
    println!("copied {} -> {}", cli.input_uri, cli.local_path);

    driver.copy_from_local(&cli.local_path, &cli.output_uri).await?;
    println!("copied {} -> {}", cli.local_path, cli.output_uri);

    let handle = driver.fopen(&cli.output_uri, 'r').await?;
    driver.fseek(handle, 0, Whence::Beg)?;
    let data = driver.fread(handle, cli.buffer_size).await?;
    driver.fclose(handle).await?;
    println!("read back {} bytes from {}", data.len(), cli.output_uri);

    driver.remove(&cli.output_uri).await?;
    println!("removed {}", cli.output_uri);

    driver.disconnect().await?;
    Ok(())
}
