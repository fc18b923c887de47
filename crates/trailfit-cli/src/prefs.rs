//! Preference command handlers for the CLI.

use std::collections::BTreeMap;

use clap::{ArgGroup, Subcommand};
use serde::Serialize;
use trailfit_agent::Orchestrator;
use trailfit_core::{CategoryPreferences, GeneralPreferences, Location, Sizing, UserProfile};
use trailfit_profile::{ProfileUpdate, StoreWarning};

use crate::print_json;

/// Sub-commands available under `prefs`.
#[derive(Debug, Subcommand)]
pub enum PrefsCommands {
    /// Print a user's effective preferences
    Show {
        #[arg(long)]
        user: String,
    },
    /// Merge preferences into a user's profile. Only the given sections change.
    Set(SetArgs),
    /// Delete one user's profile, or every profile with --all
    #[command(group(ArgGroup::new("target").required(true).args(["user", "all"])))]
    Reset {
        #[arg(long)]
        user: Option<String>,
        #[arg(long)]
        all: bool,
    },
    /// List users with a saved profile
    List,
}

#[derive(Debug, clap::Args)]
pub struct SetArgs {
    #[arg(long)]
    pub user: String,
    /// Preferred fit (slim, regular, relaxed)
    #[arg(long)]
    pub fit: Option<String>,
    #[arg(long)]
    pub size: Option<String>,
    #[arg(long)]
    pub shoe_size: Option<String>,
    /// Budget ceiling in dollars
    #[arg(long)]
    pub budget: Option<f64>,
    /// Preferred color; repeatable
    #[arg(long = "color")]
    pub colors: Vec<String>,
    /// Color to avoid; repeatable
    #[arg(long = "avoid-color")]
    pub avoid_colors: Vec<String>,
    /// Apply the colors to this category only (e.g. outerwear)
    #[arg(long)]
    pub category: Option<String>,
    #[arg(long = "like-brand")]
    pub brands_liked: Vec<String>,
    #[arg(long = "avoid-brand")]
    pub brands_avoided: Vec<String>,
    #[arg(long)]
    pub city: Option<String>,
    #[arg(long)]
    pub region: Option<String>,
}

impl SetArgs {
    /// The sections these flags touch. Colors go to `category` when one is
    /// given, otherwise to the general section.
    pub(crate) fn to_update(&self) -> ProfileUpdate {
        let sizing = Sizing {
            fit: self.fit.clone(),
            size: self.size.clone(),
            shoe_size: self.shoe_size.clone(),
        };

        let mut general = GeneralPreferences {
            budget_max: self.budget,
            brands_liked: self.brands_liked.clone(),
            brands_avoided: self.brands_avoided.clone(),
            ..GeneralPreferences::default()
        };
        let mut category_preferences = None;
        match self.category.as_deref().map(str::trim) {
            Some(category) if !category.is_empty() => {
                let colors = CategoryPreferences {
                    colors: self.colors.clone(),
                    avoid_colors: self.avoid_colors.clone(),
                    ..CategoryPreferences::default()
                };
                if !colors.is_empty() {
                    let mut map = BTreeMap::new();
                    map.insert(category.to_lowercase(), colors);
                    category_preferences = Some(map);
                }
            }
            _ => {
                general.colors.clone_from(&self.colors);
                general.avoid_colors.clone_from(&self.avoid_colors);
            }
        }

        let location = Location {
            city: self.city.clone(),
            region: self.region.clone(),
            climate: None,
        };

        ProfileUpdate {
            sizing: (!sizing.is_empty()).then_some(sizing),
            category_preferences,
            general: (!general.is_empty()).then_some(general),
            location: (!location.is_empty()).then_some(location),
        }
    }
}

#[derive(Serialize)]
struct ShowOutput<'a> {
    user_id: &'a str,
    summary: String,
    profile: UserProfile,
    #[serde(skip_serializing_if = "Option::is_none")]
    warning: Option<StoreWarning>,
}

pub(crate) fn run_prefs(command: PrefsCommands, orchestrator: &Orchestrator) -> anyhow::Result<()> {
    let store = orchestrator.store();
    match command {
        PrefsCommands::Show { user } => {
            let read = store.get(&user);
            print_json(&ShowOutput {
                user_id: &user,
                summary: store.summary(&user),
                profile: read.profile,
                warning: read.warning,
            })
        }
        PrefsCommands::Set(args) => {
            let update = args.to_update();
            if update.is_empty() {
                anyhow::bail!("nothing to save; pass at least one preference flag");
            }
            print_json(&orchestrator.save_preferences(&args.user, update, true)?)
        }
        PrefsCommands::Reset { user, all } => {
            if all {
                store.reset_all()?;
                tracing::info!("all preference profiles reset");
                print_json(&serde_json::json!({ "reset": "all" }))
            } else {
                let user = user.unwrap_or_default();
                let deleted = store.delete_user(&user)?;
                print_json(&serde_json::json!({ "user_id": user, "deleted": deleted }))
            }
        }
        PrefsCommands::List => print_json(&store.list_users()),
    }
}
