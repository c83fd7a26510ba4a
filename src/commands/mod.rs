use clap::ValueEnum;

mod config_cmd;
mod practitioner;
mod site;
mod sync_cmd;
mod work;

pub use config_cmd::ConfigCommand;
pub use practitioner::PractitionerCommand;
pub use site::SiteCommand;
pub use sync_cmd::SyncCommand;
pub use work::WorkCommand;

#[derive(Clone, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}
