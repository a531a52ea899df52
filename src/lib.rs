pub mod ihpc;
