#![forbid(unsafe_code)]

//! Vimeo downloader actor: resolves Vimeo URLs to metadata via yt-dlp,
//! optionally downloads the media, and pushes one record per item to the
//! platform dataset while storing downloaded bytes in the key-value store.
//!
//! The heavy lifting (format negotiation, network retrieval, cookie
//! authentication, transcoding) is owned by yt-dlp and ffmpeg; this crate is
//! the coordination layer around them.

pub mod batch;
pub mod config;
pub mod cookies;
pub mod download;
pub mod error;
pub mod formats;
pub mod input;
pub mod media;
pub mod processor;
pub mod proxy;
pub mod records;
pub mod storage;
pub mod ytdlp;
