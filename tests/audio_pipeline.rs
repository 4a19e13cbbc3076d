//! Integration tests for the audio pipeline.
//!
//! Tests pipe opening, frame production over on-disk pipes and the DCA byte
//! stream handed to the voice driver.

mod common;

use airplay_voice_bridge::dca::{DcaStream, DCA_MAGIC};
use airplay_voice_bridge::pipe;
use common::*;
use std::io::Read;
use tokio_test::{assert_err, assert_ok};

/// Test opening a pipe path that does not exist.
#[test]
fn test_open_missing_pipe() {
    let pipe = PipeFixture::missing();

    let result = FrameSource::open(&pipe.path);

    assert!(matches!(result, Err(BridgeError::PipeUnavailable(path)) if path == pipe.path));
}

/// Test short reads only happen at end of stream.
#[test]
fn test_read_chunk_short_only_at_end() {
    let pipe = PipeFixture::with_contents(&[1, 2, 3, 4, 5]);
    let mut source = FrameSource::open(&pipe.path).unwrap();

    assert_eq!(source.read_chunk(4).unwrap(), vec![1, 2, 3, 4]);
    assert_eq!(source.read_chunk(4).unwrap(), vec![5]);
    assert!(source.read_chunk(4).unwrap().is_empty());
}

/// Test three frames of silence produce three frames and then end of stream.
#[test]
fn test_silence_frames_then_end_of_stream() {
    let pipe = PipeFixture::with_contents(&constant_pcm(3, 0));
    let mut pipeline = fake_pipeline(FrameSource::open(&pipe.path).unwrap());

    for _ in 0..3 {
        assert_eq!(
            pipeline.next_frame(),
            FrameOutcome::Frame(EncodedFrame::new(FAKE_PACKET.to_vec()))
        );
    }
    assert_eq!(pipeline.next_frame(), FrameOutcome::EndOfStream);
    assert!(pipeline.is_closed());
}

/// Test the async worker wrappers hand the source back intact.
#[tokio::test]
async fn test_blocking_worker_round_trip() {
    let pipe = PipeFixture::with_contents(&constant_pcm(2, 7));

    let source = assert_ok!(pipe::open_blocking(pipe.path.clone()).await);
    let (source, first) = assert_ok!(pipe::read_blocking(source, SOURCE_FRAME_BYTES).await);
    assert_eq!(first.len(), SOURCE_FRAME_BYTES);

    let (source, second) = assert_ok!(pipe::read_blocking(source, SOURCE_FRAME_BYTES).await);
    assert_eq!(second.len(), SOURCE_FRAME_BYTES);

    let (_source, rest) = assert_ok!(pipe::read_blocking(source, SOURCE_FRAME_BYTES).await);
    assert!(rest.is_empty());
}

/// Test the async open reports a missing pipe.
#[tokio::test]
async fn test_blocking_open_missing_pipe() {
    let pipe = PipeFixture::missing();

    let err = assert_err!(pipe::open_blocking(pipe.path.clone()).await);

    assert!(matches!(err, BridgeError::PipeUnavailable(_)));
}

/// Test a DCA stream over an on-disk pipe contains every frame and then ends.
#[test]
fn test_dca_stream_over_pipe() {
    let pipe = PipeFixture::with_contents(&constant_pcm(3, 0));
    let pipeline = fake_pipeline(FrameSource::open(&pipe.path).unwrap());
    let mut stream = DcaStream::new(pipeline);

    let mut bytes = Vec::new();
    stream.read_to_end(&mut bytes).unwrap();

    assert_eq!(&bytes[..4], DCA_MAGIC);
    let metadata_len = i32::from_le_bytes(bytes[4..8].try_into().unwrap()) as usize;
    let frames = &bytes[8 + metadata_len..];
    assert_eq!(frames, &[2, 0, 0xab, 0xcd, 2, 0, 0xab, 0xcd, 2, 0, 0xab, 0xcd]);
    assert!(stream.is_finished());
}

/// Test a frame of the wrong size is rejected by the encoder.
#[test]
fn test_encoder_rejects_wrong_frame_size() {
    use airplay_voice_bridge::pcm::PcmChunk;

    let mut encoder = FrameEncoder::new(Box::new(FakeCodec));
    let short = PcmChunk::new(48000, 2, vec![0; 100]).unwrap();

    assert_eq!(
        encoder.encode(&short),
        Err(EncodeError::FrameLength {
            expected: TARGET_FRAME_SAMPLES,
            actual: 50
        })
    );
}
