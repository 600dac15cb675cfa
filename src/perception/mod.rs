pub mod sample_source;
