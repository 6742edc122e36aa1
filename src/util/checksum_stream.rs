use std::pin::Pin;
use std::task::{Context, Poll};

use anyhow::anyhow;
use bytes::Bytes;
use futures_core::{ready, Stream};
use hyper::Body;
use pin_project_lite::pin_project;
use sha1::{Digest, Sha1};
use tracing::trace;

/// Checksums advertised by an upstream server for a response body, if any.
#[derive(Clone, Default)]
pub struct ExpectedChecksums {
    pub sha1: Option<[u8; 20]>,
    pub md5: Option<[u8; 16]>,
}

impl ExpectedChecksums {
    pub fn is_empty(&self) -> bool {
        self.sha1.is_none() && self.md5.is_none()
    }
}

pin_project! {
    /// Wraps an HTTP body so it can be streamed onward without materializing
    /// it, while still being checked against checksums that are only
    /// verifiable once the entire body has been seen.
    ///
    /// The contract is to append an error chunk to the stream if verification
    /// fails at the end. Once an error chunk was returned, the stream stops
    /// polling upstream and stays failed.
    pub struct ChecksumStream {
        #[pin]
        body: Body,
        expected: ExpectedChecksums,
        sha1_hasher: Sha1,
        md5_context: md5::Context,
        is_failed: bool,
    }
}

impl ChecksumStream {
    pub fn new(body: Body, expected: ExpectedChecksums) -> ChecksumStream {
        ChecksumStream {
            body,
            expected,
            sha1_hasher: Sha1::default(),
            md5_context: md5::Context::new(),
            is_failed: false,
        }
    }

    fn verify(
        expected: &ExpectedChecksums,
        sha1_hasher: &Sha1,
        md5_context: &md5::Context,
    ) -> anyhow::Result<()> {
        if let Some(expected_sha1) = &expected.sha1 {
            let actual: [u8; 20] = sha1_hasher.clone().finalize().into();
            if &actual != expected_sha1 {
                return Err(anyhow!("SHA-1 mismatch on downloaded body"));
            }
            trace!("SHA-1 checksum verified");
        }
        if let Some(expected_md5) = &expected.md5 {
            let actual: [u8; 16] = md5_context.clone().compute().into();
            if &actual != expected_md5 {
                return Err(anyhow!("MD5 mismatch on downloaded body"));
            }
            trace!("MD5 checksum verified");
        }
        Ok(())
    }
}

impl Stream for ChecksumStream {
    type Item = anyhow::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.is_failed {
            return Poll::Ready(Some(Err(anyhow!("polling from failed stream"))));
        }

        let this = self.project();
        match ready!(this.body.poll_next(cx)) {
            Some(Ok(chunk)) => {
                this.sha1_hasher.update(&chunk);
                this.md5_context.consume(&chunk);
                Poll::Ready(Some(Ok(chunk)))
            }
            Some(Err(e)) => {
                *this.is_failed = true;
                Poll::Ready(Some(Err(e.into())))
            }
            None => match Self::verify(this.expected, this.sha1_hasher, this.md5_context) {
                Ok(()) => Poll::Ready(None),
                Err(e) => {
                    *this.is_failed = true;
                    Poll::Ready(Some(Err(e)))
                }
            },
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.body.size_hint()
    }
}
