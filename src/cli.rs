// Command surface: clap-derived argument parsing plus the per-command
// handlers. Single-item commands log failed items and keep going; the
// combined `create` flow is all-or-nothing with rollback instead, since
// a half-created visualisation has no remote value.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use crate::client::{Client, Session};
use crate::config::{Config, DEFAULT_API_URL};
use crate::models::{ActivityInfo, VisualisationUrlOptions};

/// A command line interface to doarama.com.
#[derive(Parser, Debug)]
#[clap(name = "doarama", version, about = "A command line interface to doarama.com")]
pub struct Cli {
    /// Doarama API URL
    #[clap(long, env = "DOARAMA_API_URL", default_value = DEFAULT_API_URL, global = true)]
    pub api_url: String,

    /// Doarama API name
    #[clap(long, env = "DOARAMA_API_NAME", default_value = "", global = true, hide_default_value = true)]
    pub api_name: String,

    /// Doarama API key
    #[clap(long, env = "DOARAMA_API_KEY", default_value = "", global = true, hide_default_value = true)]
    pub api_key: String,

    /// Doarama user ID (anonymous authentication)
    #[clap(long, env = "DOARAMA_USER_ID", global = true)]
    pub user_id: Option<String>,

    /// Doarama user key (delegated authentication)
    #[clap(long, env = "DOARAMA_USER_KEY", global = true)]
    pub user_key: Option<String>,

    /// Request timeout in seconds
    #[clap(long, env = "DOARAMA_TIMEOUT", global = true)]
    pub timeout: Option<u64>,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Manages activities
    #[clap(visible_alias = "a")]
    Activity {
        #[clap(subcommand)]
        command: ActivityCommand,
    },

    /// Creates a visualisation URL from one or more tracklogs
    #[clap(visible_alias = "c")]
    Create {
        /// Activity type id to set on each uploaded track
        #[clap(long)]
        type_id: Option<i64>,

        #[clap(flatten)]
        url_options: UrlOptionArgs,

        /// Track files (GPX or IGC) to upload, in composite order
        tracks: Vec<PathBuf>,
    },

    /// Queries activity types
    #[clap(name = "query-activity-types", visible_alias = "qat")]
    QueryActivityTypes,

    /// Manages visualisations
    #[clap(visible_alias = "v")]
    Visualisation {
        #[clap(subcommand)]
        command: VisualisationCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum ActivityCommand {
    /// Creates an activity from one or more tracklogs
    #[clap(visible_alias = "c")]
    Create {
        /// Activity type id to set on each uploaded track
        #[clap(long)]
        type_id: Option<i64>,

        /// Track files (GPX or IGC) to upload
        #[clap(required = true)]
        tracks: Vec<PathBuf>,
    },

    /// Deletes one or more activities by id
    #[clap(visible_alias = "d")]
    Delete {
        /// Activity ids to delete
        #[clap(required = true)]
        ids: Vec<i64>,
    },
}

#[derive(Subcommand, Debug)]
pub enum VisualisationCommand {
    /// Creates a visualisation from a list of activities
    #[clap(visible_alias = "c")]
    Create {
        /// Activity ids, in composite order
        #[clap(required = true)]
        activity_ids: Vec<i64>,
    },

    /// Creates a visualisation URL from a visualisation key
    #[clap(visible_alias = "u")]
    Url {
        #[clap(flatten)]
        url_options: UrlOptionArgs,

        /// Visualisation keys
        #[clap(required = true)]
        keys: Vec<String>,
    },
}

/// Visualisation URL display options. An omitted flag contributes no
/// query parameter, leaving the service default in effect.
#[derive(Args, Debug, Default)]
pub struct UrlOptionArgs {
    /// Display name per activity, repeatable in activity order
    #[clap(long = "name")]
    pub names: Vec<String>,

    /// Avatar image reference per activity, repeatable in activity order
    #[clap(long = "avatar")]
    pub avatars: Vec<String>,

    /// Base URL prepended to relative avatar references
    #[clap(long)]
    pub avatar_base_url: Option<String>,

    /// Lock the rendering aspect ratio
    #[clap(long)]
    pub fixed_aspect: bool,

    /// Request a reduced-chrome rendering
    #[clap(long)]
    pub minimal_view: bool,

    /// DZML overlay markup payload reference
    #[clap(long)]
    pub dzml: Option<String>,
}

impl UrlOptionArgs {
    fn to_options(&self) -> VisualisationUrlOptions {
        VisualisationUrlOptions {
            names: self.names.clone(),
            avatars: self.avatars.clone(),
            avatar_base_url: self.avatar_base_url.clone(),
            fixed_aspect: self.fixed_aspect,
            minimal_view: self.minimal_view,
            dzml: self.dzml.clone(),
        }
    }
}

impl Cli {
    /// Resolve the process-wide configuration once, from flags and
    /// environment.
    pub fn config(&self) -> Config {
        Config {
            api_url: self.api_url.clone(),
            api_name: self.api_name.clone(),
            api_key: self.api_key.clone(),
            timeout: self.timeout.map(Duration::from_secs),
        }
    }

    fn session(&self, client: &Client) -> crate::Result<Session> {
        client.authenticate(self.user_id.as_deref(), self.user_key.as_deref())
    }
}

/// Dispatch a parsed invocation. Returns an error if the command failed
/// outright or if any item in a log-and-continue batch failed; either
/// way the process exits non-zero.
pub fn run(cli: Cli) -> anyhow::Result<()> {
    let client = Client::new(cli.config())?;
    match &cli.command {
        Command::Activity { command } => match command {
            ActivityCommand::Create { type_id, tracks } => {
                activity_create(&cli.session(&client)?, *type_id, tracks)
            }
            ActivityCommand::Delete { ids } => activity_delete(&cli.session(&client)?, ids),
        },
        Command::Create {
            type_id,
            url_options,
            tracks,
        } => create(&client, &cli.session(&client)?, *type_id, url_options, tracks),
        Command::QueryActivityTypes => query_activity_types(&client),
        Command::Visualisation { command } => match command {
            VisualisationCommand::Create { activity_ids } => {
                visualisation_create(&client, &cli.session(&client)?, activity_ids)
            }
            VisualisationCommand::Url { url_options, keys } => {
                visualisation_url(&client, url_options, keys);
                Ok(())
            }
        },
    }
}

/// Per-file create: one bad track is logged and skipped, the rest are
/// still uploaded.
fn activity_create(session: &Session, type_id: Option<i64>, tracks: &[PathBuf]) -> anyhow::Result<()> {
    let info = type_id.map(|type_id| ActivityInfo { type_id });
    let mut failures = 0usize;
    for path in tracks {
        let activity = match session.create_activity_from_path(path) {
            Ok(activity) => activity,
            Err(err) => {
                tracing::error!(track = %path.display(), error = %err, "activity create failed");
                failures += 1;
                continue;
            }
        };
        println!("ActivityId: {}", activity.id);
        if let Some(info) = &info {
            if let Err(err) = session.set_activity_info(&activity, info) {
                tracing::error!(track = %path.display(), error = %err, "set activity info failed");
                failures += 1;
            }
        }
    }
    check_failures(failures, tracks.len())
}

/// Per-id delete: one bad id is logged and skipped, the rest are still
/// deleted.
fn activity_delete(session: &Session, ids: &[i64]) -> anyhow::Result<()> {
    let mut failures = 0usize;
    for &id in ids {
        let activity = session.client().activity(id);
        if let Err(err) = session.delete_activity(&activity) {
            tracing::error!(id, error = %err, "activity delete failed");
            failures += 1;
        }
    }
    check_failures(failures, ids.len())
}

/// The combined upload → visualise → URL flow. All-or-nothing: the first
/// failed track rolls back every activity created so far.
fn create(
    client: &Client,
    session: &Session,
    type_id: Option<i64>,
    url_options: &UrlOptionArgs,
    tracks: &[PathBuf],
) -> anyhow::Result<()> {
    let info = type_id.map(|type_id| ActivityInfo { type_id });
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner} {msg}")?);
    spinner.set_message("Uploading tracks...");
    spinner.enable_steady_tick(Duration::from_millis(100));
    let result = session.visualise_tracks(tracks, info.as_ref(), |activity| {
        spinner.suspend(|| println!("ActivityId: {}", activity.id));
    });
    spinner.finish_and_clear();
    let visualisation = result?;
    println!("VisualisationKey: {}", visualisation.key);
    println!(
        "VisualisationURL: {}",
        client.visualisation_url(&visualisation, &url_options.to_options())
    );
    Ok(())
}

fn query_activity_types(client: &Client) -> anyhow::Result<()> {
    let types = client
        .activity_types()
        .context("querying activity types")?;
    for activity_type in types {
        println!("{}: {}", activity_type.name, activity_type.id);
    }
    Ok(())
}

fn visualisation_create(
    client: &Client,
    session: &Session,
    activity_ids: &[i64],
) -> anyhow::Result<()> {
    let activities: Vec<_> = activity_ids.iter().map(|&id| client.activity(id)).collect();
    let visualisation = session
        .create_visualisation(&activities)
        .context("creating visualisation")?;
    println!("VisualisationKey: {}", visualisation.key);
    Ok(())
}

/// Purely local: renders URLs for known keys without touching the
/// network.
fn visualisation_url(client: &Client, url_options: &UrlOptionArgs, keys: &[String]) {
    let options = url_options.to_options();
    for key in keys {
        let visualisation = client.visualisation(key.clone());
        println!(
            "VisualisationURL: {}",
            client.visualisation_url(&visualisation, &options)
        );
    }
}

fn check_failures(failures: usize, total: usize) -> anyhow::Result<()> {
    if failures > 0 {
        anyhow::bail!("{failures} of {total} items failed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_global_flags_before_subcommand() {
        let cli = Cli::try_parse_from([
            "doarama",
            "--api-name",
            "app",
            "--api-key",
            "secret",
            "--user-id",
            "u1",
            "query-activity-types",
        ])
        .unwrap();
        assert_eq!(cli.api_name, "app");
        assert_eq!(cli.user_id.as_deref(), Some("u1"));
        assert!(matches!(cli.command, Command::QueryActivityTypes));
    }

    #[test]
    fn parses_visualisation_url_options() {
        let cli = Cli::try_parse_from([
            "doarama",
            "visualisation",
            "url",
            "--name",
            "a",
            "--name",
            "b",
            "--fixed-aspect",
            "KEY",
        ])
        .unwrap();
        let Command::Visualisation {
            command: VisualisationCommand::Url { url_options, keys },
        } = cli.command
        else {
            panic!("expected visualisation url command");
        };
        assert_eq!(keys, vec!["KEY"]);
        let options = url_options.to_options();
        assert_eq!(options.names, vec!["a", "b"]);
        assert!(options.fixed_aspect);
        assert!(!options.minimal_view);
        assert_eq!(options.dzml, None);
    }

    #[test]
    fn create_accepts_zero_tracks_for_late_validation() {
        // The empty batch is rejected by the library with a distinct
        // error, not by the argument parser.
        let cli = Cli::try_parse_from(["doarama", "create"]).unwrap();
        let Command::Create { tracks, .. } = cli.command else {
            panic!("expected create command");
        };
        assert!(tracks.is_empty());
    }

    #[test]
    fn delete_rejects_malformed_ids_before_any_remote_call() {
        assert!(Cli::try_parse_from(["doarama", "activity", "delete", "not-a-number"]).is_err());
    }

    #[test]
    fn timeout_flag_becomes_config_duration() {
        let cli =
            Cli::try_parse_from(["doarama", "--timeout", "30", "query-activity-types"]).unwrap();
        assert_eq!(cli.config().timeout, Some(Duration::from_secs(30)));
    }
}
