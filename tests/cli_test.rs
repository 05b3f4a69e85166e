use clap::Parser;
use kiln::cli::{Args, Commands};
use std::ffi::OsString;
use std::path::PathBuf;

fn make_args(args: &[&str]) -> Vec<OsString> {
    let mut res = vec![OsString::from("kiln")];
    res.extend(args.iter().map(OsString::from));
    res
}

#[test]
fn test_basic_args() {
    let parsed = Args::try_parse_from(make_args(&["create", "shop"])).unwrap();

    assert!(!parsed.verbose);
    let Commands::Create(create) = parsed.command;
    assert_eq!(create.name, "shop");
    assert!(create.config.is_none());
    assert!(create.templates.is_none());
    assert!(!create.no_editor);
    assert!(create.passthrough.is_empty());
}

#[test]
fn test_all_flags() {
    let args = make_args(&[
        "-v",
        "create",
        "--no-editor",
        "--config",
        "kiln.yml",
        "--templates",
        "./templates",
        "shop",
    ]);
    let parsed = Args::try_parse_from(args).unwrap();

    assert!(parsed.verbose);
    let Commands::Create(create) = parsed.command;
    assert!(create.no_editor);
    assert_eq!(create.config, Some(PathBuf::from("kiln.yml")));
    assert_eq!(create.templates, Some(PathBuf::from("./templates")));
    assert_eq!(create.name, "shop");
}

#[test]
fn test_unknown_flags_pass_through() {
    let args = make_args(&["create", "shop", "--typescript", "--src-dir", "--import-alias", "@/*"]);
    let parsed = Args::try_parse_from(args).unwrap();

    let Commands::Create(create) = parsed.command;
    assert_eq!(create.name, "shop");
    assert_eq!(create.passthrough, vec!["--typescript", "--src-dir", "--import-alias", "@/*"]);
}

#[test]
fn test_double_dash_passes_known_flags() {
    let args = make_args(&["create", "shop", "--", "--no-editor"]);
    let parsed = Args::try_parse_from(args).unwrap();

    let Commands::Create(create) = parsed.command;
    assert!(!create.no_editor);
    assert_eq!(create.passthrough, vec!["--no-editor"]);
}

#[test]
fn test_missing_name() {
    assert!(Args::try_parse_from(make_args(&["create"])).is_err());
}

#[test]
fn test_missing_subcommand() {
    assert!(Args::try_parse_from(make_args(&[])).is_err());
}
