pub mod assembly_ai;
pub mod sftp;
