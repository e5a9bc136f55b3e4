use gtd_cli::{
    project::{Partition, ProjectCommands}, step::StepCommands, tags::TagCommands, Cli, Commands, Parser,
};
use std::io::Write;
use std::path::PathBuf;

#[test]
fn test_cli_parsing_project_add() {
    let args = vec![
        "gtd",
        "project",
        "add",
        "Taxes",
        "--category",
        "Work",
        "--status",
        "Open",
    ];

    let cli = Cli::try_parse_from(args).unwrap();
    match cli.command {
        Commands::Project {
            subcommand: ProjectCommands::Add(args),
        } => {
            let record = args.record();
            assert_eq!(record.name, "Taxes");
            assert_eq!(record.kategorie, "Work");
            assert_eq!(record.status, "Open");
        }
        _ => panic!("expected project add"),
    }
}

#[test]
fn test_cli_parsing_global_flags_after_subcommand() {
    let args = vec![
        "gtd",
        "project",
        "list",
        "--demo",
        "--db",
        "/tmp/gtd.db",
        "--log-level",
        "debug",
    ];

    let cli = Cli::try_parse_from(args).unwrap();
    assert!(cli.demo);
    assert_eq!(cli.db, Some(PathBuf::from("/tmp/gtd.db")));
    assert_eq!(cli.log_level, tracing::Level::DEBUG);
    assert!(matches!(
        cli.command,
        Commands::Project {
            subcommand: ProjectCommands::List(_)
        }
    ));
}

#[test]
fn test_cli_parsing_project_reorder_requires_ids() {
    assert!(Cli::try_parse_from(vec!["gtd", "project", "reorder"]).is_err());

    let cli = Cli::try_parse_from(vec!["gtd", "project", "reorder", "3", "1", "2"]).unwrap();
    assert!(matches!(
        cli.command,
        Commands::Project {
            subcommand: ProjectCommands::Reorder { ref ids }
        } if ids == &[3, 1, 2]
    ));
}

#[test]
fn test_cli_parsing_project_move() {
    let cli = Cli::try_parse_from(vec!["gtd", "project", "move", "5", "--to", "demo"]).unwrap();
    assert!(matches!(
        cli.command,
        Commands::Project {
            subcommand: ProjectCommands::Move {
                id: 5,
                to: Partition::Demo
            }
        }
    ));
    assert!(Cli::try_parse_from(vec!["gtd", "project", "move", "5", "--to", "archive"]).is_err());
}

#[test]
fn test_cli_parsing_step_toggle() {
    let cli = Cli::try_parse_from(vec!["gtd", "step", "toggle", "7"]).unwrap();
    assert!(matches!(
        cli.command,
        Commands::Step {
            subcommand: StepCommands::Toggle { id: 7 }
        }
    ));
}

#[test]
fn test_cli_parsing_step_add_target() {
    let cli = Cli::try_parse_from(vec!["gtd", "step", "add", "1", "Run", "--target-seconds", "1800"]).unwrap();
    match cli.command {
        Commands::Step {
            subcommand: StepCommands::Add(args),
        } => {
            let record = args.record();
            assert_eq!(record.project_id.0, 1);
            assert_eq!(record.ziel_zeit_seconds, 1800);
            assert!(!record.is_running);
        }
        _ => panic!("expected step add"),
    }
}

#[test]
fn test_cli_parsing_status_rename_to_empty() {
    let cli = Cli::try_parse_from(vec!["gtd", "status", "rename", "Open", ""]).unwrap();
    assert!(matches!(
        cli.command,
        Commands::Status {
            subcommand: TagCommands::Rename { ref old, ref new }
        } if old == "Open" && new.is_empty()
    ));
}

#[test]
fn test_cli_parsing_watch_defaults() {
    let cli = Cli::try_parse_from(vec!["gtd", "watch", "4"]).unwrap();
    match cli.command {
        Commands::Watch(args) => {
            assert_eq!(args.project_id, 4);
            assert_eq!(args.seconds, 10);
        }
        _ => panic!("expected watch"),
    }
}

#[test]
fn test_cli_rejects_unknown_log_level() {
    assert!(Cli::try_parse_from(vec!["gtd", "--log-level", "loud", "category", "list"]).is_err());
}

#[test]
fn test_flags_override_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{ "database_path": "/tmp/from-config.db", "heartbeat_millis": 500 }}"#
    )
    .unwrap();
    let config_path = file.path().to_str().unwrap().to_string();

    let cli = Cli::try_parse_from(vec![
        "gtd",
        "--config",
        &config_path,
        "--db",
        "/tmp/from-flag.db",
        "--demo",
        "category",
        "list",
    ])
    .unwrap();
    let config = cli.load_config().unwrap();
    assert_eq!(config.database_path, Some(PathBuf::from("/tmp/from-flag.db")));
    assert!(config.demo_mode);
    assert_eq!(config.heartbeat_millis, 500);
}

#[tokio::test]
async fn test_open_tracker_on_temp_database() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("gtd.db");
    let cli = Cli::try_parse_from(vec!["gtd", "--db", db.to_str().unwrap(), "project", "list"]).unwrap();

    let tracker = cli.open_tracker().unwrap();
    let projects = tracker.projects().await.unwrap();
    assert!(projects.current().is_empty());
    assert!(db.exists());
}
