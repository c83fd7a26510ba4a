use clap::{Args, Subcommand};
use std::io::{self, Write};

use heritage_archive_core::{
    ArchiveHolder, PractitionerDraft, PractitionerRecord, ShareLink, WorkRecord,
};

use super::OutputFormat;
use crate::config::Config;
use crate::media::{self, MediaKind};
use crate::sync::with_archive;

#[derive(Args)]
pub struct PractitionerCommand {
    #[command(subcommand)]
    pub command: PractitionerSubcommand,
}

#[derive(Subcommand)]
pub enum PractitionerSubcommand {
    /// Add a practitioner
    Add {
        /// Full name
        name: String,

        /// Phone or other contact details
        #[arg(long)]
        contact: Option<String>,

        /// Recognised skill and heritage level
        #[arg(long)]
        skill: Option<String>,

        #[arg(long)]
        birth_date: Option<String>,

        #[arg(long)]
        birth_place: Option<String>,

        /// Experience entry (can be repeated)
        #[arg(long = "experience", value_name = "TEXT")]
        experience: Vec<String>,

        /// Award (can be repeated)
        #[arg(long = "award", value_name = "TEXT")]
        awards: Vec<String>,

        /// Avatar image URL or local file
        #[arg(long)]
        avatar: Option<String>,

        /// Name of the first representative work
        #[arg(long)]
        work: Option<String>,
    },

    /// List practitioners
    List {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Only show practitioners matching name, skill or work
        #[arg(long, short)]
        search: Option<String>,
    },

    /// Show a practitioner's details
    Show {
        /// Practitioner ID or name
        identifier: String,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Update an existing practitioner
    Update {
        /// Practitioner ID or name
        identifier: String,

        /// New name
        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        contact: Option<String>,

        #[arg(long)]
        skill: Option<String>,

        #[arg(long)]
        birth_date: Option<String>,

        #[arg(long)]
        birth_place: Option<String>,

        /// Add an experience entry (can be repeated)
        #[arg(long = "add-experience", value_name = "TEXT")]
        add_experience: Vec<String>,

        /// Add an award (can be repeated)
        #[arg(long = "add-award", value_name = "TEXT")]
        add_awards: Vec<String>,

        /// Remove an award (can be repeated)
        #[arg(long = "remove-award", value_name = "TEXT")]
        remove_awards: Vec<String>,

        /// Avatar image URL or local file
        #[arg(long)]
        avatar: Option<String>,
    },

    /// Delete a practitioner
    Delete {
        /// Practitioner ID or name
        identifier: String,

        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },
}

/// Finds a practitioner by id or name.
pub fn lookup(holder: &ArchiveHolder, identifier: &str) -> Result<PractitionerRecord, String> {
    holder
        .current()
        .find(identifier)
        .cloned()
        .ok_or_else(|| format!("Practitioner not found: {}", identifier))
}

impl PractitionerCommand {
    pub fn run(&self, config: &Config, link: &ShareLink) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            PractitionerSubcommand::Add {
                name,
                contact,
                skill,
                birth_date,
                birth_place,
                experience,
                awards,
                avatar,
                work,
            } => {
                let avatar = avatar
                    .as_deref()
                    .map(|a| media::resolve(a, MediaKind::Image))
                    .transpose()?;

                let draft = PractitionerDraft {
                    name: name.clone(),
                    avatar,
                    contact: contact.clone().unwrap_or_default(),
                    skill_and_level: skill.clone().unwrap_or_default(),
                    birth_date: birth_date.clone(),
                    birth_place: birth_place.clone(),
                    experience: experience.join("\n"),
                    awards: awards.clone(),
                    works: vec![WorkRecord::new(work.clone().unwrap_or_default())],
                };
                let record = draft.into_record(None)?;

                with_archive(config, link, |holder| {
                    holder.update(|state| state.with_practitioner(record.clone()));
                    Ok(())
                })?;

                println!("Added practitioner:");
                println!("{}", record);
                Ok(())
            }

            PractitionerSubcommand::List { format, search } => {
                let state = with_archive(config, link, |holder| Ok(holder.current()))?;
                let practitioners = state.search(search.as_deref().unwrap_or(""));

                if practitioners.is_empty() {
                    println!("No practitioners found");
                    return Ok(());
                }

                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&practitioners)?);
                    }
                    OutputFormat::Text => {
                        println!("{:<36}  {:<20}  {:>5}  SKILL", "ID", "NAME", "WORKS");
                        println!("{}", "-".repeat(90));
                        for p in &practitioners {
                            println!(
                                "{:<36}  {:<20}  {:>5}  {}",
                                p.id,
                                truncate(&p.name, 20),
                                p.works.len(),
                                truncate(&p.skill_and_level, 40)
                            );
                        }
                        println!("\nTotal: {} practitioner(s)", practitioners.len());
                    }
                }
                Ok(())
            }

            PractitionerSubcommand::Show { identifier, format } => {
                let record = with_archive(config, link, |holder| Ok(lookup(holder, identifier)?))?;

                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&record)?);
                    }
                    OutputFormat::Text => {
                        println!("{}", record);
                    }
                }
                Ok(())
            }

            PractitionerSubcommand::Update {
                identifier,
                name,
                contact,
                skill,
                birth_date,
                birth_place,
                add_experience,
                add_awards,
                remove_awards,
                avatar,
            } => {
                let has_updates = name.is_some()
                    || contact.is_some()
                    || skill.is_some()
                    || birth_date.is_some()
                    || birth_place.is_some()
                    || !add_experience.is_empty()
                    || !add_awards.is_empty()
                    || !remove_awards.is_empty()
                    || avatar.is_some();

                if !has_updates {
                    return Err("Nothing to update. Provide at least one option.".into());
                }

                let avatar = avatar
                    .as_deref()
                    .map(|a| media::resolve(a, MediaKind::Image))
                    .transpose()?;

                let updated = with_archive(config, link, |holder| {
                    let existing = lookup(holder, identifier)?;
                    let id = existing.id.clone();
                    let mut draft = PractitionerDraft::from_record(&existing);

                    if let Some(name) = name {
                        draft.name = name.clone();
                    }
                    if let Some(contact) = contact {
                        draft.contact = contact.clone();
                    }
                    if let Some(skill) = skill {
                        draft.skill_and_level = skill.clone();
                    }
                    if let Some(date) = birth_date {
                        draft.birth_date = Some(date.clone());
                    }
                    if let Some(place) = birth_place {
                        draft.birth_place = Some(place.clone());
                    }
                    if avatar.is_some() {
                        draft.avatar = avatar.clone();
                    }
                    for line in add_experience {
                        if !draft.experience.is_empty() {
                            draft.experience.push('\n');
                        }
                        draft.experience.push_str(line);
                    }
                    for award in add_awards {
                        if !draft.awards.contains(award) {
                            draft.awards.push(award.clone());
                        }
                    }
                    draft.awards.retain(|a| !remove_awards.contains(a));

                    let record = draft.into_record(Some(existing.id))?;
                    holder.update(|state| state.with_practitioner(record));
                    Ok(lookup(holder, &id)?)
                })?;

                println!("Updated practitioner:");
                println!("{}", updated);
                Ok(())
            }

            PractitionerSubcommand::Delete { identifier, force } => {
                let deleted = with_archive(config, link, |holder| {
                    let record = lookup(holder, identifier)?;

                    // Confirm deletion unless --force is used
                    if !force && !confirm(&format!("Delete practitioner '{}'?", record.name))? {
                        return Ok(None);
                    }

                    holder.try_update(|state| state.without_practitioner(&record.id))?;
                    Ok(Some(record))
                })?;

                match deleted {
                    Some(record) => println!("Deleted practitioner: {}", record.name),
                    None => println!("Deletion cancelled."),
                }
                Ok(())
            }
        }
    }
}

pub(crate) fn confirm(prompt: &str) -> io::Result<bool> {
    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() > width {
        let cut: String = text.chars().take(width.saturating_sub(3)).collect();
        format!("{}...", cut)
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use heritage_archive_core::ArchiveState;

    #[test]
    fn test_truncate_counts_chars() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("闫强强闫强强", 5), "闫强...");
    }

    #[test]
    fn test_lookup_by_id_and_name() {
        let holder = ArchiveHolder::new(ArchiveState::seed());
        assert_eq!(lookup(&holder, "1").unwrap().name, "闫强强");
        assert_eq!(lookup(&holder, "闫强强").unwrap().id, "1");
        assert!(lookup(&holder, "nobody")
            .unwrap_err()
            .contains("Practitioner not found"));
    }
}
