use {anyhow::Result, clap::Subcommand, paraman_config::ParamanConfig};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the config file in use, or where `init` would create one.
    Path,
    /// Write the default configuration to the config file.
    Init {
        /// Overwrite an existing config file.
        #[arg(long)]
        force: bool,
    },
}

pub fn handle_config(action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Path => {
            let path = paraman_config::find_or_default_config_path();
            if path.exists() {
                println!("{}", path.display());
            } else {
                println!("{} (not created yet)", path.display());
            }
            Ok(())
        },
        ConfigAction::Init { force } => {
            let path = init(force)?;
            println!("Wrote {}", path.display());
            Ok(())
        },
    }
}

fn init(force: bool) -> Result<std::path::PathBuf> {
    let path = paraman_config::find_or_default_config_path();
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists (pass --force to overwrite)",
            path.display()
        );
    }
    paraman_config::save_config(&ParamanConfig::default())
}
