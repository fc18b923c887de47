use clap::Parser;

use super::*;
use crate::prefs::PrefsCommands;

#[test]
fn parses_query_with_filters() {
    let cli = Cli::try_parse_from([
        "trailfit",
        "query",
        "warm jacket",
        "--user",
        "sarah",
        "--k",
        "5",
        "--filter",
        "max_price=300",
        "--filter",
        "brand = NorthPeak",
    ])
    .expect("expected valid cli args");

    match cli.command {
        Commands::Query {
            text,
            user,
            k,
            filters,
        } => {
            assert_eq!(text, "warm jacket");
            assert_eq!(user.as_deref(), Some("sarah"));
            assert_eq!(k, Some(5));
            assert_eq!(
                filters,
                vec![
                    ("max_price".to_owned(), "300".to_owned()),
                    ("brand".to_owned(), "NorthPeak".to_owned()),
                ]
            );
        }
        other => panic!("unexpected command {other:?}"),
    }
}

#[test]
fn filter_without_equals_is_rejected() {
    assert!(Cli::try_parse_from(["trailfit", "query", "jacket", "--filter", "max_price"]).is_err());
    assert!(Cli::try_parse_from(["trailfit", "query", "jacket", "--filter", "=300"]).is_err());
}

#[test]
fn feedback_requires_a_user() {
    assert!(Cli::try_parse_from(["trailfit", "feedback", "too expensive"]).is_err());

    let cli = Cli::try_parse_from([
        "trailfit",
        "feedback",
        "--user",
        "sarah",
        "too expensive",
        "--category",
        "outerwear",
    ])
    .expect("expected valid cli args");
    assert!(matches!(
        cli.command,
        Commands::Feedback { category: Some(ref c), .. } if c == "outerwear"
    ));
}

#[test]
fn prefs_reset_needs_a_target() {
    assert!(Cli::try_parse_from(["trailfit", "prefs", "reset"]).is_err());

    let cli = Cli::try_parse_from(["trailfit", "prefs", "reset", "--all"])
        .expect("expected valid cli args");
    assert!(matches!(
        cli.command,
        Commands::Prefs {
            command: PrefsCommands::Reset {
                user: None,
                all: true
            }
        }
    ));
}

#[test]
fn prefs_set_colors_go_to_the_named_category() {
    let cli = Cli::try_parse_from([
        "trailfit",
        "prefs",
        "set",
        "--user",
        "sarah",
        "--color",
        "blue",
        "--category",
        "Outerwear",
        "--budget",
        "300",
        "--city",
        "Fargo",
    ])
    .expect("expected valid cli args");

    let Commands::Prefs {
        command: PrefsCommands::Set(args),
    } = cli.command
    else {
        panic!("expected prefs set");
    };
    let update = args.to_update();

    assert!(update.sizing.is_none());
    let categories = update.category_preferences.unwrap();
    assert_eq!(categories["outerwear"].colors, vec!["blue"]);
    let general = update.general.unwrap();
    assert_eq!(general.budget_max, Some(300.0));
    assert!(general.colors.is_empty());
    assert_eq!(update.location.unwrap().city.as_deref(), Some("Fargo"));
}

#[test]
fn prefs_set_without_flags_is_empty() {
    let cli = Cli::try_parse_from(["trailfit", "prefs", "set", "--user", "sarah"])
        .expect("expected valid cli args");
    let Commands::Prefs {
        command: PrefsCommands::Set(args),
    } = cli.command
    else {
        panic!("expected prefs set");
    };
    assert!(args.to_update().is_empty());
}

#[test]
fn parses_catalog_index() {
    let cli = Cli::try_parse_from(["trailfit", "catalog", "index"]).expect("expected valid cli args");
    assert!(matches!(
        cli.command,
        Commands::Catalog {
            command: CatalogCommands::Index
        }
    ));
}
