//-
// Copyright (c) 2026, Jason Lingle
//
// This file is part of Folderstore.
//
// Folderstore is free software: you can redistribute it and/or modify it
// under the terms of the GNU General Public License as published by the Free
// Software Foundation, either version 3 of the License, or (at your option)
// any later version.
//
// Folderstore is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or
// FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for
// more details.
//
// You should have received a copy of the GNU General Public License along
// with Folderstore. If not, see <http://www.gnu.org/licenses/>.

use std::path::PathBuf;

use structopt::StructOpt;

use crate::support::sysexits::*;
use crate::support::system_config::SystemConfig;

#[derive(StructOpt)]
#[structopt(max_term_width = 80)]
enum Command {
    /// Print the effective configuration, including defaults.
    ShowConfig(CommonOptions),
    /// Run a script of session steps against a fresh in-memory store.
    ///
    /// The script is a TOML file containing an array of `[[step]]` tables.
    /// Each step names an operation in its `op` key; values produced by a
    /// step can be bound to a name with `as` and referenced by later steps.
    ///
    /// One line is printed per step, giving the result code the operation
    /// would put on the wire.
    Run(RunSubcommand),
}

#[derive(StructOpt, Default)]
struct CommonOptions {
    /// The directory containing `folderstore.toml` and, optionally,
    /// `logging.toml` [default: current directory]
    #[structopt(long, parse(from_os_str))]
    root: Option<PathBuf>,
}

#[derive(StructOpt)]
struct RunSubcommand {
    #[structopt(flatten)]
    common: CommonOptions,

    /// The script to run.
    #[structopt(parse(from_os_str))]
    script: PathBuf,
}

pub fn main() {
    // Clap exits with status 1 instead of EX_USAGE if we use the more concise
    // API
    let cmd = Command::from_clap(&match Command::clap().get_matches_safe() {
        Ok(matches) => matches,
        Err(
            e @ clap::Error {
                kind: clap::ErrorKind::HelpDisplayed,
                ..
            },
        )
        | Err(
            e @ clap::Error {
                kind: clap::ErrorKind::VersionDisplayed,
                ..
            },
        ) => {
            println!("{}", e.message);
            return;
        },
        Err(e) => {
            eprintln!("{}", e.message);
            EX_USAGE.exit()
        },
    });

    let common = match cmd {
        Command::ShowConfig(ref c) => c,
        Command::Run(ref c) => &c.common,
    };
    let root = common.root.clone().unwrap_or_else(|| ".".to_owned().into());

    let system_config = match SystemConfig::load(&root) {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Error in config file at '{}': {}",
                root.join(SystemConfig::FILE_NAME).display(),
                e
            );
            EX_CONFIG.exit()
        },
    };

    let log_config_file = root.join("logging.toml");
    if log_config_file.is_file() {
        if let Err(e) = log4rs::init_file(
            &log_config_file,
            log4rs::file::Deserializers::new(),
        ) {
            eprintln!(
                "Error in logging config at '{}': {}",
                log_config_file.display(),
                e
            );
            EX_CONFIG.exit();
        }
    } else {
        crate::init_simple_log();
    }

    match cmd {
        Command::ShowConfig(_) => show_config(&system_config),
        Command::Run(cmd) => super::script::run(system_config, &cmd.script),
    }
}

fn show_config(config: &SystemConfig) {
    match toml::to_string_pretty(config) {
        Ok(text) => print!("{}", text),
        Err(e) => {
            eprintln!("Failed to format configuration: {}", e);
            EX_SOFTWARE.exit()
        },
    }
}
