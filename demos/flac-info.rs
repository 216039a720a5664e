use flac_extract::{
    Error, Options,
    metadata::{Application, Block, Padding, Picture, SeekTable, Streaminfo, VorbisComment},
};
use std::path::Path;

/// Lists every metadata block of each FLAC file given,
/// followed by a short summary of its frames.
///
/// Blocks are listed in the same style as
/// "metaflac --list <file1.flac> <file2.flac> ..."
/// with the input path displayed once, first.

fn main() {
    for flac in std::env::args_os().skip(1) {
        if let Err(err) = display_file(&flac) {
            eprintln!("* {}: {err}", flac.display());
        }
    }
}

fn display_file<P: AsRef<Path>>(path: P) -> Result<(), Error> {
    println!("{}:", path.as_ref().display());

    let data = std::fs::read(path)?;
    let flac = flac_extract::extract(&data, Options::default().frames(true))?;

    for (num, block) in flac.blocks().iter().enumerate() {
        let block_type = block.block_type();

        println!("METADATA block #{num}");
        println!("  type: {} ({block_type})", block_type.code());
        println!("  is last: {}", block.is_last());
        println!("  length: {}", block.data().len());

        match block.decode()? {
            Some(Block::Streaminfo(b)) => display_streaminfo(b),
            Some(Block::Padding(b)) => display_padding(b),
            Some(Block::Application(b)) => display_application(b),
            Some(Block::SeekTable(b)) => display_seektable(b),
            Some(Block::VorbisComment(b)) => display_vorbis_comment(b),
            Some(Block::Picture(b)) => display_picture(b),
            Some(Block::Reserved { .. }) | None => { /* nothing further to show */ }
        }
    }

    let frames = flac.frames().unwrap_or_default();
    println!("FRAMES starting at byte {}", flac.frames_offset());
    println!("  frames: {}", frames.len());
    println!(
        "  samples: {}",
        frames
            .iter()
            .map(|f| u64::from(f.header.block_size))
            .sum::<u64>()
    );
    println!(
        "  bad CRC-16: {}",
        frames.iter().filter(|f| !f.verify()).count()
    );

    Ok(())
}

fn display_streaminfo(streaminfo: Streaminfo) {
    println!(
        "  minimum blocksize: {} samples",
        streaminfo.minimum_block_size
    );
    println!(
        "  maximum blocksize: {} samples",
        streaminfo.maximum_block_size
    );
    if let Some(minimum_frame_size) = streaminfo.minimum_frame_size {
        println!("  minimum framesize: {} bytes", minimum_frame_size.get());
    }
    if let Some(maximum_frame_size) = streaminfo.maximum_frame_size {
        println!("  maximum framesize: {} bytes", maximum_frame_size.get());
    }
    println!("  sample rate: {} Hz", streaminfo.sample_rate);
    println!("  channels: {}", streaminfo.channels.get());
    println!("  bits-per-sample: {}", streaminfo.bits_per_sample.get());
    if let Some(total_samples) = streaminfo.total_samples {
        println!("  total samples: {}", total_samples.get());
    }
    if let Some(md5) = streaminfo.md5 {
        println!("  MD5 signature: {}", Hex(&md5));
    }
}

fn display_padding(padding: Padding) {
    println!("  padding: {} bytes", padding.size)
}

fn display_application(application: Application) {
    println!("  application ID: {:X}", application.id);
    println!("  data length: {}", application.data.len());
}

fn display_seektable(seektable: SeekTable) {
    println!("  seek points: {}", seektable.points.len());
    for (num, point) in seektable.points.into_iter().enumerate() {
        if point.is_placeholder() {
            println!("    point {num}: placeholder");
        } else {
            println!(
                "    point {num}: sample number={}, stream offset={:X}, frame samples={}",
                point.sample_offset, point.byte_offset, point.frame_samples,
            );
        }
    }
}

fn display_vorbis_comment(comment: VorbisComment) {
    println!("  vendor string: {}", comment.vendor_string);
    println!("  comments: {}", comment.len());
    for (num, (key, value)) in comment
        .fields()
        .flat_map(|(key, values)| values.iter().map(move |value| (key, value)))
        .enumerate()
    {
        println!("    comment[{num}]: {key}={value}");
    }
}

fn display_picture(picture: Picture) {
    println!("  picture type: {:?}", picture.picture_type);
    println!("  MIME type: {}", picture.media_type);
    println!("  description: {}", picture.description);
    println!("  width: {}", picture.width);
    println!("  height: {}", picture.height);
    println!("  depth: {}", picture.color_depth);
    match picture.colors_used {
        None => println!("  colors: 0 (unindexed)"),
        Some(colors) => println!("  colors: {colors}"),
    }
    println!("  data length: {}", picture.data.len());
}

struct Hex<'h>(&'h [u8]);

impl std::fmt::Display for Hex<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        self.0.iter().try_for_each(|b| write!(f, "{:02x}", b))
    }
}
