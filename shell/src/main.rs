// Copyright 2026 blockfs contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Interactive, read-only shell over a FAT32 or NTFS volume. Mirrors a DOS
//! box closely enough that `dir`-shaped habits transfer, but every command
//! underneath is backed by `blockfs_core::Volume`.

use std::io::{self, BufRead, Write};

use blockfs_core::Volume as _;
use blockfs_volume::Volume;
use clap::Parser;
use log::error;

/// Explore a FAT32 or NTFS volume read-only.
#[derive(Parser, Debug)]
#[command(name = "blockfs", version, about)]
struct Cli {
    /// Path to the volume: a raw device (`\\.\C:`) or a disk image file.
    volume: String,

    /// Run a single command non-interactively instead of starting a REPL.
    #[arg(short = 'c', long = "command")]
    command: Option<String>,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let volume = match blockfs_volume::open(&cli.volume) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("blockfs: could not open {}: {e}", cli.volume);
            std::process::exit(1);
        }
    };

    match cli.command {
        Some(line) => run_line(&volume, &line),
        None => repl(&volume),
    }
}

fn repl(volume: &Volume) {
    let stdin = io::stdin();
    loop {
        print!("{}> ", volume.cwd());
        let _ = io::stdout().flush();

        let mut line = String::new();
        if stdin.lock().read_line(&mut line).unwrap_or(0) == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "bye" | "exit" | "quit") {
            break;
        }
        run_line(volume, line);
    }
}

fn run_line(volume: &Volume, line: &str) {
    let mut parts = line.split_whitespace();
    let Some(cmd) = parts.next() else { return };
    let args: Vec<&str> = parts.collect();

    let result = match cmd {
        "ls" | "dir" => cmd_ls(volume, args.first().copied().unwrap_or("")),
        "cd" => cmd_cd(volume, args.first().copied().unwrap_or("")),
        "pwd" => {
            println!("{}", volume.cwd());
            Ok(())
        }
        "tree" => cmd_tree(volume, args.first().copied().unwrap_or(""), 0),
        "cat" | "type" => cmd_cat(volume, args.first().copied().unwrap_or("")),
        "xxd" => cmd_xxd(volume, args.first().copied().unwrap_or("")),
        "echo" => {
            println!("{}", args.join(" "));
            Ok(())
        }
        "fsstat" => {
            println!("{}", volume.describe());
            Ok(())
        }
        "bye" | "exit" | "quit" => Ok(()),
        other => {
            println!("unknown command: {other}");
            Ok(())
        }
    };

    if let Err(e) = result {
        error!("{cmd}: {e}");
        println!("{cmd}: {e}");
    }
}

fn cmd_ls(volume: &Volume, path: &str) -> blockfs_err::Result<()> {
    let listing = volume.list(path)?;
    for entry in listing.entries() {
        let kind = if entry.is_directory() { "<DIR>" } else { "     " };
        println!("{:>10}  {}  {} {}", entry.size, kind, entry.modified, entry.name);
    }
    Ok(())
}

fn cmd_cd(volume: &Volume, path: &str) -> blockfs_err::Result<()> {
    volume.change_dir(path)
}

fn cmd_tree(volume: &Volume, path: &str, depth: usize) -> blockfs_err::Result<()> {
    let listing = volume.list(path)?;
    for entry in listing.entries() {
        // `list()` does not filter `.`/`..`; a tree walk must, or a FAT32
        // subdirectory's own `.`/`..` entries recurse into themselves forever.
        if entry.name == "." || entry.name == ".." {
            continue;
        }
        println!("{}{}", "  ".repeat(depth), entry.name);
        if entry.is_directory() {
            let child_path = if path.is_empty() {
                entry.name.clone()
            } else {
                format!("{path}\\{}", entry.name)
            };
            cmd_tree(volume, &child_path, depth + 1)?;
        }
    }
    Ok(())
}

fn cmd_cat(volume: &Volume, path: &str) -> blockfs_err::Result<()> {
    let text = volume.read_text_file(path)?;
    println!("{text}");
    Ok(())
}

fn cmd_xxd(volume: &Volume, path: &str) -> blockfs_err::Result<()> {
    let bytes = volume.read_file(path)?;
    for (i, chunk) in bytes.chunks(16).enumerate() {
        let hex: Vec<String> = chunk.iter().map(|b| format!("{b:02x}")).collect();
        let ascii: String = chunk
            .iter()
            .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' })
            .collect();
        println!("{:08x}  {:<47}  {}", i * 16, hex.join(" "), ascii);
    }
    Ok(())
}
