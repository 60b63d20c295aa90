// Utility Module
// File handling and key persistence around the RSA core

pub mod file_ops;
pub mod key_store;

pub use file_ops::{decrypted_path, encrypted_path, format_file_size, write_atomic};
pub use key_store::{load_key, load_private_key, load_public_key, save_key, save_keypair};
