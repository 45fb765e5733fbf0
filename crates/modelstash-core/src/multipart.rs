//! Chunked multipart upload for very large files.
//!
//! Splits a single object put into concurrent part uploads with a bounded
//! number of parts in flight, reading the source file in fixed-size slabs
//! so memory stays bounded. [`ObjectStoreGateway::put_file`] switches to
//! this path automatically once a file reaches the configured chunk size;
//! smaller files take the single-part put. Either way the coherence
//! contract is unchanged, this is purely a throughput substitution for
//! the final upload step.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use object_store::path::Path as ObjectPath;
use object_store::WriteMultipart;

use crate::store::{ObjectStoreGateway, StoreResult};

/// Upper bound on parts in flight at once.
const MAX_CONCURRENT_PARTS: usize = 10;

/// Slab size for reading the source file.
const READ_BUF_SIZE: usize = 8 * 1024 * 1024;

impl ObjectStoreGateway {
    /// Upload `local_file` to `key` in `chunk_size` parts, at most
    /// [`MAX_CONCURRENT_PARTS`] in flight.
    pub fn put_file_chunked(
        &self,
        local_file: &Path,
        key: &str,
        chunk_size: u64,
    ) -> StoreResult<()> {
        let location = ObjectPath::from(key);
        let mut reader = BufReader::new(File::open(local_file)?);

        self.runtime().block_on(async {
            let upload = self.store().put_multipart(&location).await?;
            let mut writer = WriteMultipart::new_with_chunk_size(upload, chunk_size as usize);
            let mut buf = vec![0u8; READ_BUF_SIZE];
            loop {
                let read = reader.read(&mut buf)?;
                if read == 0 {
                    break;
                }
                writer.wait_for_capacity(MAX_CONCURRENT_PARTS).await?;
                writer.write(&buf[..read]);
            }
            writer.finish().await?;
            Ok(())
        })
    }
}
