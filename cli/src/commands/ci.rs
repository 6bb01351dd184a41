//! `goldens ci`.

use anyhow::{Context as _, Result};
use goldens_compare::Config;

use crate::output::Output;

/// Print the CI context and the review client a comparison would publish with.
pub fn run_ci() -> Result<()> {
    let config = Config::init().context("Failed to load configuration")?;
    let out = Output::new();

    let context = config.ci_context();
    out.labeled("Context", context);
    out.labeled("Goldens", config.goldens_dir().display());
    out.labeled("Results", config.results_dir().display());

    match (context.is_ci(), config.client_name()) {
        (false, _) => out.info("Running locally, screenshots are not published"),
        (true, Some(name)) => {
            out.labeled("Client", name);
            out.labeled("Work dir", config.gold_work_dir().display());
            out.success(format!("Screenshots will be published via {name}"));
        }
        (true, None) => out.warning("CI detected but no review client is configured"),
    }
    Ok(())
}
