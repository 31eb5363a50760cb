// SPDX-License-Identifier: MIT
// cli/chat.rs — `glowd chat` terminal REPL.
//
// Interactive product advisor in the terminal: browse the catalog by
// category, toggle product selections, and generate an AI usage routine via
// the configured relay. The previous session (selection + transcript) is
// restored on startup and replayed.
//
// Usage:
//   glowd chat                 # interactive session
//   glowd chat --ask "..."     # single-shot question, print response, exit

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write as IoWrite};

use crate::advisor::client::RelayClient;
use crate::advisor::{Advisor, ChatMessage, ChatOptions, Role};
use crate::catalog::Catalog;
use crate::config::GlowdConfig;
use crate::store::Store;

const PLACEHOLDER: &str = "Select a category to view products";

/// Options for the `glowd chat` command.
#[derive(Debug, Default)]
pub struct ChatOpts {
    /// Single-shot non-interactive question — print response and exit.
    pub ask: Option<String>,
}

/// Entry point for `glowd chat`.
pub async fn run_chat(opts: ChatOpts, config: &GlowdConfig) -> Result<()> {
    let store = Store::open(&config.data_dir).await?;

    // A failed catalog load is not fatal: the session still restores, with
    // browsing disabled until the source is fixed.
    let http = reqwest::Client::new();
    let catalog = match Catalog::load(&http, &config.catalog_source).await {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(err = %e, "catalog unavailable — continuing with empty catalog");
            eprintln!("warning: {e}");
            Catalog::default()
        }
    };

    let client = RelayClient::new(config.chat.relay_url.clone());
    let options = ChatOptions {
        model: config.chat.model.clone(),
        max_tokens: config.chat.max_tokens,
        temperature: config.chat.temperature,
    };
    let mut advisor = Advisor::restore(catalog, store, client, options).await;

    if let Some(question) = opts.ask {
        let reply = with_spinner(advisor.ask(&question)).await;
        println!("{}", reply.content);
        return Ok(());
    }

    run_repl(&mut advisor, &config.catalog_source).await
}

// ─── Interactive loop ─────────────────────────────────────────────────────────

async fn run_repl(advisor: &mut Advisor, catalog_source: &str) -> Result<()> {
    println!("glowd chat — type /help for commands, /quit to exit.");
    if advisor.catalog().is_empty() {
        println!("(catalog unavailable — browsing commands are disabled)");
    }

    // Replay the restored transcript.
    for message in advisor.transcript() {
        print_message(message);
    }

    loop {
        print!("> ");
        io::stdout().flush()?;
        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            break; // EOF
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(command) = line.strip_prefix('/') {
            if !handle_command(advisor, command, catalog_source).await? {
                break;
            }
            continue;
        }

        // Free-form question.
        let reply = with_spinner(advisor.ask(line)).await;
        print_message(reply);
    }
    Ok(())
}

/// Returns false when the REPL should exit.
async fn handle_command(
    advisor: &mut Advisor,
    command: &str,
    catalog_source: &str,
) -> Result<bool> {
    let (name, arg) = match command.split_once(' ') {
        Some((n, a)) => (n, a.trim()),
        None => (command, ""),
    };

    match name {
        "quit" | "exit" => return Ok(false),
        "help" => print_help(),
        "categories" => {
            for category in advisor.catalog().categories() {
                println!("  {category}");
            }
        }
        "products" => {
            if arg.is_empty() {
                println!("{PLACEHOLDER}");
            } else {
                let products = advisor.catalog().filter_by_category(arg);
                if products.is_empty() {
                    println!("(no products in category '{arg}')");
                }
                for p in products {
                    let mark = if advisor.selection().contains(&p.id) { "*" } else { " " };
                    println!(" {mark}[{}] {} — {}", p.id, p.name, p.brand);
                }
            }
        }
        "select" => match arg.parse::<i64>() {
            Ok(id) => {
                advisor.toggle_selection(id).await;
                print_selected(advisor);
            }
            Err(_) => println!("usage: /select <product-id>"),
        },
        "selected" => print_selected(advisor),
        "clear" => {
            advisor.clear_selections().await;
            println!("selection cleared");
        }
        "routine" => {
            let outcome = with_spinner(advisor.generate_routine()).await.cloned();
            match outcome {
                Ok(reply) => print_message(&reply),
                // Only EmptySelection comes back as an error; everything else
                // already landed in the transcript as a friendly message.
                Err(e) => println!("{e}"),
            }
        }
        "reload" => {
            // A failed reload keeps the catalog we already have.
            match Catalog::load(&reqwest::Client::new(), catalog_source).await {
                Ok(catalog) => {
                    println!("catalog reloaded ({} products)", catalog.len());
                    advisor.set_catalog(catalog);
                }
                Err(e) => println!("{e} — keeping the current catalog"),
            }
        }
        "reset" => {
            advisor.reset_transcript().await;
            println!("transcript cleared");
        }
        _ => println!("unknown command '/{name}' — type /help"),
    }
    Ok(true)
}

fn print_help() {
    println!(
        "  /categories            list catalog categories\n  \
         /products <category>   list products in a category (* = selected)\n  \
         /select <id>           toggle a product selection\n  \
         /selected              show the current selection\n  \
         /clear                 clear the selection\n  \
         /routine               generate a routine for the selection\n  \
         /reload                reload the catalog from its source\n  \
         /reset                 wipe the chat transcript\n  \
         /quit                  exit"
    );
}

fn print_selected(advisor: &Advisor) {
    let products = advisor.selected_products();
    if products.is_empty() {
        println!("(nothing selected)");
        return;
    }
    for p in products {
        println!("  [{}] {} — {}", p.id, p.name, p.brand);
    }
}

fn print_message(message: &ChatMessage) {
    let prefix = match message.role {
        Role::User => "you",
        Role::Assistant => "glow",
        Role::System => "sys",
    };
    println!("{prefix}> {}", message.content);
}

/// Show a spinner while a future resolves (the exchange suspends only this
/// interaction; nothing else is blocked).
async fn with_spinner<T>(fut: impl std::future::Future<Output = T>) -> T {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message("Thinking…");
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));
    let out = fut.await;
    spinner.finish_and_clear();
    out
}
