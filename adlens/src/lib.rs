pub mod handlers;

// Re-export the helpers that have no terminal side effects
pub use handlers::{
    decode_disclosure, expand_path, format_ad_line, init_database, open_database, parse_text,
    read_input,
    render_disclosure,
};
