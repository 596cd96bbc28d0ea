use crate::timeline::Caption;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

pub fn write_srt(path: &Path, captions: &[Caption], wrap_width: usize) -> anyhow::Result<()> {
    let mut f = BufWriter::new(File::create(path)?);
    for (i, caption) in captions.iter().enumerate() {
        writeln!(f, "{}", i + 1)?;
        writeln!(
            f,
            "{} --> {}",
            format_srt_time(caption.start),
            format_srt_time(caption.end)
        )?;
        for line in wrap_text(&caption.text, wrap_width) {
            writeln!(f, "{}", line)?;
        }
        writeln!(f)?;
    }
    f.flush()?;
    Ok(())
}

/// libass style for centered, outlined captions.
pub fn caption_style(font_size: u32) -> String {
    format!(
        "Fontsize={},PrimaryColour=&H00FFFFFF&,OutlineColour=&H00000000&,BorderStyle=1,Outline=3,Shadow=0,Bold=1,Alignment=5",
        font_size
    )
}

/// Quote a path for use inside an ffmpeg filter argument.
pub fn escape_filter_path(path: &Path) -> String {
    let mut out = String::new();
    for c in path.to_string_lossy().chars() {
        match c {
            '\\' => out.push('/'),
            ':' | '\'' | ',' | '[' | ']' | ';' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

fn format_srt_time(seconds: f64) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let ms = total_ms % 1000;
    let total_sec = total_ms / 1000;
    let s = total_sec % 60;
    let total_min = total_sec / 60;
    let m = total_min % 60;
    let h = total_min / 60;
    format!("{:02}:{:02}:{:02},{:03}", h, m, s, ms)
}

fn wrap_text(s: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in s.split_whitespace() {
        if current.len() + word.len() + 1 > width && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
            current.push_str(word);
        } else {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn srt_times_are_zero_padded() {
        assert_eq!(format_srt_time(0.0), "00:00:00,000");
        assert_eq!(format_srt_time(3.8), "00:00:03,800");
        assert_eq!(format_srt_time(3725.0456), "01:02:05,046");
        assert_eq!(format_srt_time(-0.2), "00:00:00,000");
    }

    #[test]
    fn long_lines_wrap_on_words() {
        let lines = wrap_text("the quick brown fox jumps over the lazy dog", 15);
        assert_eq!(lines, vec!["the quick brown", "fox jumps over", "the lazy dog"]);
        assert_eq!(wrap_text("supercalifragilistic", 5), vec!["supercalifragilistic"]);
    }

    #[test]
    fn srt_file_has_numbered_cues() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subs.srt");
        let captions = vec![
            Caption {
                start: 0.0,
                end: 1.5,
                text: "Part 1 of 2".to_string(),
            },
            Caption {
                start: 1.5,
                end: 5.3,
                text: "I never thought it would happen to me.".to_string(),
            },
        ];
        write_srt(&path, &captions, 20).unwrap();
        let srt = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            srt,
            "1\n00:00:00,000 --> 00:00:01,500\nPart 1 of 2\n\n\
             2\n00:00:01,500 --> 00:00:05,300\nI never thought it\nwould happen to me.\n\n"
        );
    }

    #[test]
    fn filter_paths_are_escaped() {
        assert_eq!(
            escape_filter_path(Path::new("C:\\tmp\\it's,here.srt")),
            "C\\:/tmp/it\\'s\\,here.srt"
        );
        assert_eq!(escape_filter_path(Path::new("/tmp/a.srt")), "/tmp/a.srt");
    }
}
