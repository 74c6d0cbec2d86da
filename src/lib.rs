//! # Error Guide
//!
//! A knowledge-base service for installation and runtime errors.
//!
//! The guide loads a structured corpus of known errors (`errors.json`),
//! ranks records against free-text problem descriptions, and answers
//! questions through an LLM completion provider grounded in the best
//! matching records. Answers to single-turn questions are cached.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌──────────────┐
//! │ errors.json │──▶│   Matcher   │──▶│ Prompt build │
//! │   corpus    │   │ score+rank  │   │  + provider  │
//! └─────────────┘   └──────┬──────┘   └──────┬───────┘
//!                          │                 │
//!          ┌───────────────┼─────────────────┤
//!          ▼               ▼                 ▼
//!     ┌──────────┐   ┌──────────┐      ┌──────────┐
//!     │   CLI    │   │   MCP    │      │   HTTP   │
//!     │(errguide)│   │ (stdio)  │      │  (axum)  │
//!     └──────────┘   └──────────┘      └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! errguide match "npm install EACCES"     # rank corpus records
//! errguide search "proxy timeout"         # all-terms keyword search
//! errguide chat "PowerShell won't run scripts" --provider groq
//! errguide serve                          # start the HTTP API
//! errguide export --out public            # static index + llms.txt
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Domain error type |
//! | [`logging`] | tracing subscriber setup |
//! | [`corpus`] | Corpus loading with degraded fallback |
//! | [`catalog`] | Category and error lookups |
//! | [`search`] | Keyword search and relevance matching |
//! | [`prompt`] | Grounded system prompt construction |
//! | [`provider`] | Completion provider abstraction |
//! | [`chat`] | Cached, grounded chat orchestration |
//! | [`firestore`] | Document-store REST client |
//! | [`feedback`] | Answer feedback intake |
//! | [`webhook`] | Signed payment webhook handling |
//! | [`traits`] | Tool trait and registry |
//! | [`server`] | HTTP server |
//! | [`mcp`] | MCP bridge over stdio |
//! | [`export`] | Static artifact export |
//! | [`eval`] | Matcher evaluation harness |

pub mod catalog;
pub mod chat;
pub mod config;
pub mod corpus;
pub mod error;
pub mod eval;
pub mod export;
pub mod feedback;
pub mod firestore;
pub mod logging;
pub mod mcp;
pub mod prompt;
pub mod provider;
pub mod search;
pub mod server;
pub mod traits;
pub mod webhook;
