//! Local file store: export input, import output and database log files.

pub mod delimited_source;
pub mod log_uploader;
pub mod part_file_sink;
