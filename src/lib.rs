//! # Subnetpool - Subnet pool allocator for container networks
//!
//! This library allocates and releases fixed-size IP subnets carved out of
//! one or more larger, non-overlapping base prefixes, for assigning addresses
//! to container networks and endpoints.
//!
//! ## Overview
//!
//! A base prefix such as `10.0.0.0/8` is split into equally-sized subnets
//! (e.g. `/24`s). Subnets are numbered by ordinal in address order, and a
//! sparse ledger records which ordinals are in use. Several base prefixes are
//! combined into a pool that remembers where the last allocation happened and
//! starts the next one just past it, so a subnet that was just released is not
//! immediately handed out again.
//!
//! ## Key Features
//!
//! - **IPv4 and IPv6**: identical behaviour for 32-bit and 128-bit addresses
//! - **Huge address spaces**: a `/16` split into `/80`s (close to 2^64 subnets)
//!   costs no more memory than the number of allocation runs
//! - **Anti-thrashing**: approximate least-recently-used reuse of subnets
//! - **Strict validation**: overlapping or out-of-range descriptors are rejected
//!   at construction time
//!
//! ## Architecture
//!
//! - `ip`: subnet arithmetic, ledgers, blocks, pools and the pool registry
//! - `config`: configuration structures and default pools
//! - `config_loader`: configuration file loading
//! - `orchestrator`: scripted allocate/release runs and reports
//! - `utils`: descriptor validation
//!
//! ## Example Usage
//!
//! ```rust
//! use ipnet::IpNet;
//! use subnetpool::ip::Pool;
//!
//! let mut pool = Pool::new(&[
//!     ("10.0.0.0/16".parse::<IpNet>()?, 16),
//!     ("10.1.0.0/16".parse::<IpNet>()?, 16),
//! ])?;
//!
//! let first = pool.allocate().unwrap();
//! assert_eq!(first.to_string(), "10.0.0.0/16");
//!
//! // A released subnet is only reused once the cursor comes back around.
//! pool.release(&first);
//! assert_eq!(pool.allocate().unwrap().to_string(), "10.1.0.0/16");
//! assert_eq!(pool.allocate(), Some(first));
//! assert_eq!(pool.allocate(), None);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Configuration Format
//!
//! ```yaml
//! general:
//!   log_level: info
//!
//! pools:
//!   local:
//!     - base: "172.17.0.0/16"
//!       size: 16
//!     - base: "192.168.0.0/16"
//!       size: 20
//!   global:
//!     - base: "10.0.0.0/8"
//!       size: 24
//! ```
//!
//! ## Concurrency
//!
//! Pools and registries are plain values with no internal locking. Callers
//! sharing one across threads wrap it in a single `Mutex` covering each
//! allocate/release call.
//!
//! ## Error Handling
//!
//! Library types report construction failures through `thiserror` enums
//! carrying the offending index or prefix. Exhaustion and releasing a foreign
//! subnet are ordinary `None`/`false` results. File loading returns
//! `color_eyre` results with context.

pub mod config;
pub mod config_loader;
pub mod ip;
pub mod orchestrator;
pub mod utils;
