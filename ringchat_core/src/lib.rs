/*!
Core of ringchat, a pseudonymous peer-to-peer chat.

Nodes form a ring ordered by the hash of their pseudonyms and only know their
successor and predecessor ([`ring`]). A node finds its chat partner by
passing a search around the ring, then sends every message through a three
hop onion circuit made of its two neighbors and the partner ([`onion`]).
Every frame travels over its own TCP connection ([`net`]).
*/

#![forbid(unsafe_code)]

#[macro_use]
extern crate log;

pub mod io_tokio;
pub mod net;
pub mod node;
pub mod node_ext;
pub mod onion;
pub mod ring;
pub mod state;
