#![allow(dead_code)]

pub mod shards;
