use clap::{Args, Subcommand};

use heritage_archive_core::{ShareLink, SiteConfig};

use super::OutputFormat;
use crate::config::Config;
use crate::media::{self, MediaKind};
use crate::sync::with_archive;

#[derive(Args)]
pub struct SiteCommand {
    #[command(subcommand)]
    pub command: SiteSubcommand,
}

#[derive(Subcommand)]
pub enum SiteSubcommand {
    /// Show the site header and footer settings
    Show {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Change site header and footer settings
    Set {
        #[arg(long)]
        header_title: Option<String>,

        #[arg(long)]
        header_subtitle: Option<String>,

        #[arg(long)]
        footer_title: Option<String>,

        #[arg(long)]
        footer_description: Option<String>,

        /// Comma-separated footer tags
        #[arg(long)]
        footer_tags: Option<String>,

        /// QR code image URL or local file
        #[arg(long)]
        footer_qr: Option<String>,

        /// Remove the footer QR code
        #[arg(long, conflicts_with = "footer_qr")]
        clear_qr: bool,
    },
}

impl SiteCommand {
    pub fn run(&self, config: &Config, link: &ShareLink) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            SiteSubcommand::Show { format } => {
                let site = with_archive(config, link, |holder| Ok(holder.current().site_config))?;

                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&site)?);
                    }
                    OutputFormat::Text => {
                        println!("{}", site);
                    }
                }
                Ok(())
            }

            SiteSubcommand::Set {
                header_title,
                header_subtitle,
                footer_title,
                footer_description,
                footer_tags,
                footer_qr,
                clear_qr,
            } => {
                let has_updates = header_title.is_some()
                    || header_subtitle.is_some()
                    || footer_title.is_some()
                    || footer_description.is_some()
                    || footer_tags.is_some()
                    || footer_qr.is_some()
                    || *clear_qr;

                if !has_updates {
                    return Err("Nothing to update. Provide at least one option.".into());
                }

                let footer_qr = footer_qr
                    .as_deref()
                    .map(|q| media::resolve(q, MediaKind::Image))
                    .transpose()?;

                let site = with_archive(config, link, |holder| {
                    let mut site: SiteConfig = holder.current().site_config;
                    if let Some(title) = header_title {
                        site.header_title = title.clone();
                    }
                    if let Some(subtitle) = header_subtitle {
                        site.header_subtitle = subtitle.clone();
                    }
                    if let Some(title) = footer_title {
                        site.footer_title = title.clone();
                    }
                    if let Some(description) = footer_description {
                        site.footer_description = description.clone();
                    }
                    if let Some(tags) = footer_tags {
                        site.footer_tags = SiteConfig::parse_tags(tags);
                    }
                    if footer_qr.is_some() {
                        site.footer_qr_code = footer_qr.clone();
                    }
                    if *clear_qr {
                        site.footer_qr_code = None;
                    }

                    holder.update(|state| state.with_site_config(site.clone()));
                    Ok(site)
                })?;

                println!("Updated site configuration:");
                println!("{}", site);
                Ok(())
            }
        }
    }
}
