// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

fn build_cli() -> Command {
    Command::new("depsolve")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Conary Contributors")
        .about("Query rpm-md repositories and resolve package dependencies")
        .long_about(
            "Reads one JSON request (dump or depsolve) from stdin or --request, \
             writes one JSON response to stdout. Errors are reported as \
             {\"kind\", \"reason\"}; repository, marking and depsolve failures \
             exit with status 10, everything else with 1.",
        )
        .arg(
            Arg::new("request")
                .short('r')
                .long("request")
                .value_name("FILE")
                .help("Read the request from FILE instead of stdin"),
        )
        .arg(
            Arg::new("arch")
                .long("arch")
                .help("Target base architecture (defaults to the host)"),
        )
        .arg(
            Arg::new("metadata_expire")
                .long("metadata-expire")
                .default_value("172800")
                .help("Seconds before cached metadata is considered stale"),
        )
        .arg(
            Arg::new("no_weak_deps")
                .long("no-weak-deps")
                .action(ArgAction::SetTrue)
                .help("Do not pull in weak (Recommends) dependencies"),
        )
        .subcommand(
            Command::new("completions")
                .about("Generate shell completion scripts")
                .arg(
                    Arg::new("shell")
                        .required(true)
                        .value_parser(["bash", "elvish", "fish", "powershell", "zsh"])
                        .help("Shell type"),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let out_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let man_dir = out_dir.join("man");
    fs::create_dir_all(&man_dir).expect("Failed to create man directory");

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();
    man.render(&mut buffer).expect("Failed to render man page");

    let man_path = man_dir.join("depsolve.1");
    fs::write(&man_path, buffer).expect("Failed to write man page");
}
