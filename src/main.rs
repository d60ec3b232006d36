use mongo_gcs_backup::backup::execute_backup;
use mongo_gcs_backup::database::create_producer;
use mongo_gcs_backup::error::Result;
use mongo_gcs_backup::upload::create_uploader;
use mongo_gcs_backup::{config, log};
use tracing::{error, info};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    log::init();

    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let config = config::load()?;
    let producer = create_producer(&config.dump);
    let uploader = create_uploader(&config.upload)?;

    let report = execute_backup(&config, producer.as_ref(), uploader.as_ref()).await?;

    info!(
        "Run summary: gs://{}/{} ({} bytes uploaded, local copy {}) in {} sec",
        report.bucket,
        report.object_name,
        report.bytes_uploaded,
        if report.local_removed {
            "removed".to_string()
        } else {
            format!("kept at {}", report.archive_path.display())
        },
        report.duration_secs
    );
    Ok(())
}
