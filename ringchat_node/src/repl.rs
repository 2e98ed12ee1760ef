//! Console chat loop.

use std::str::FromStr;

use anyhow::Error;
use futures::{FutureExt, StreamExt};
use futures::channel::mpsc::UnboundedReceiver;
use itertools::Itertools;
use ringchat::core::node::Node;
use ringchat::core::onion::CircuitError;
use ringchat::core::ring::HandlePacketError;
use ringchat::packet::frame::ChatMessage;
use ringchat::packet::identity::NodeIdentity;
use tokio::io::{stdin, AsyncBufReadExt, BufReader};

const HELP: &str = "\
Commands:
  search <pseudonym>  find a node and make it the chat partner
  send <text>         send a message to the chat partner
  status              show the ring neighbors and the chat partner
  quit                stop the node";

/// Console command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConsoleCommand {
    Search(String),
    Send(String),
    Status,
    Help,
    Quit,
}

impl FromStr for ConsoleCommand {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let command = words.next().unwrap_or_default();
        let rest = words.join(" ");

        match command {
            "search" if !rest.is_empty() => Ok(ConsoleCommand::Search(rest)),
            "send" if !rest.is_empty() => Ok(ConsoleCommand::Send(rest)),
            "search" | "send" => Err(format!("'{}' needs an argument", command)),
            "status" => Ok(ConsoleCommand::Status),
            "help" | "" => Ok(ConsoleCommand::Help),
            "quit" | "exit" => Ok(ConsoleCommand::Quit),
            _ => Err(format!("Unknown command '{}'", command)),
        }
    }
}

async fn print_status(node: &Node) {
    let table = node.ring.table().await;
    println!("node:        {} ({})", table.node, table.node.node_id.as_str());
    println!("successor:   {}", table.successor);
    println!("predecessor: {}", table.predecessor);
    match node.messenger.partner().await {
        Some(partner) if node.messenger.is_ready().await => println!("partner:     {} (ready)", partner),
        Some(partner) => println!("partner:     {} (preparing circuit)", partner),
        None => println!("partner:     none"),
    }
}

/// Run one command. Returns `false` when the console should stop.
async fn execute(node: &Node, command: ConsoleCommand) -> bool {
    match command {
        ConsoleCommand::Search(pseudonym) => match node.search(&pseudonym).await {
            Ok(Some(_)) => {},
            Ok(None) => println!("Searching for {}...", pseudonym),
            Err(HandlePacketError::NoNeighbors) => println!("No ring neighbors to search for {}, join a ring first", pseudonym),
            Err(e) => println!("Search failed: {}", e),
        },
        ConsoleCommand::Send(text) => match node.messenger.send(&text).await {
            Ok(()) => {},
            Err(CircuitError::NoPartner) => println!("No chat partner, use 'search' first"),
            Err(e) => println!("Failed to send message: {}", e),
        },
        ConsoleCommand::Status => print_status(node).await,
        ConsoleCommand::Help => println!("{}", HELP),
        ConsoleCommand::Quit => return false,
    }
    true
}

/// Read commands from stdin and print chat events until `quit` or the end
/// of input.
pub async fn run_console(
    node: &Node,
    mut messages: UnboundedReceiver<ChatMessage>,
    mut partners: UnboundedReceiver<NodeIdentity>,
) -> Result<(), Error> {
    let mut lines = BufReader::new(stdin()).lines();
    println!("{}", HELP);

    loop {
        futures::select! {
            line = lines.next_line().fuse() => {
                let line = match line? {
                    Some(line) => line,
                    None => return Ok(()),
                };
                match line.parse() {
                    Ok(command) => if !execute(node, command).await {
                        return Ok(());
                    },
                    Err(e) => println!("{}", e),
                }
            },
            message = messages.next() => if let Some(message) = message {
                println!("> {}", message.text);
            },
            partner = partners.next() => if let Some(partner) = partner {
                println!("Found {}, preparing circuit", partner);
            },
        }
    }
}
