pub mod checksum_stream;
