//! End-to-end tests over synthesized dump containers.

mod analysis;
mod cuckoo;
mod loading;
mod stages;
