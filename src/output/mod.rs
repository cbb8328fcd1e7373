pub mod csv;
pub mod statistics;

pub use csv::{
    write_day_csv, write_hour_csv, write_minute_csv, write_minute_volume_csv,
    write_stripe_heatmap_csv, write_stripe_ops_csv, write_stripe_update_csv, write_volume_by_minute_dir,
    write_volume_csv,
};
pub use statistics::print_top_volumes;
