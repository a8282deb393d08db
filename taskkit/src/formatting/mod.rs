//! CLI formatting utilities.
//!
//! This module keeps colors, symbols and table styling consistent across
//! commands.

mod headers;
mod output;
mod status;
mod tables;

pub use headers::{print_section_header, SectionStyle};
pub use output::{format_duration, print_key_value, print_summary_box};
pub use status::{print_error, print_info, print_success, print_warning, Status};
pub use tables::{print_edge_table, print_task_table, TaskRow};
