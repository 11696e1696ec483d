//! # workboard - Work Item Roadmap CLI
//!
//! A command-line roadmap for teams tracking hierarchical work items.
//!
//! ## Key Features
//!
//! - **Configurable Hierarchy**: Ordered type levels (e.g. Initiative → Epic
//!   → Feature), each tagged with the audiences (Roadmap, Planning, Building)
//!   that should see it.
//! - **Swimlane Projection**: Work items and their hierarchy links are
//!   rebuilt into a three-level tree of rows: top groupings, parent
//!   groupings, one row per leaf item.
//! - **Timeline Positioning**: Each leaf's target date maps to a
//!   percentage-based position on a configurable date axis with Day, Week,
//!   Month or Quarter granularity.
//! - **Backlog Panel**: Leaf items without a target date (and not completed)
//!   are listed separately and can be scheduled onto the axis.
//! - **Local File Storage**: One JSON board file per project plus a flat
//!   JSON settings store, both written atomically.
//!
//! ## Quick Start
//!
//! ```bash
//! # Create starter files
//! workboard init --project "Platform"
//!
//! # Choose the roadmap levels
//! workboard hierarchy set '[{"WorkItemTypes":["Initiative"],"Audience":["Roadmap"]},
//!   {"WorkItemTypes":["Epic"],"Audience":["Roadmap"]},
//!   {"WorkItemTypes":["Feature"],"Audience":["Roadmap"]}]'
//!
//! # Render the roadmap
//! workboard roadmap
//!
//! # Put a backlog item on the timeline
//! workboard schedule 42 2024-06-01
//! workboard schedule 42 --at 35.5
//! ```
//!
//! Data is stored locally in `~/.workboard/`; pass `--board`/`--settings`
//! to point elsewhere. Set `RUST_LOG` to raise the log level.

pub mod board;
pub mod cli;
pub mod cmd;
pub mod hierarchy;
pub mod roadmap;
pub mod settings;
pub mod states;
pub mod workitem;
