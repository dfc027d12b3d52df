//! Media tree copying.

use std::{fs, io, path::Path};

use walkdir::WalkDir;

/// Recursively copy the contents of `src` into `dest`, creating `dest`.
///
/// Symlinks are followed: the archive holds the files they point at, not
/// the links. Returns the number of files copied.
pub fn copy_tree(src: &Path, dest: &Path) -> io::Result<u64> {
  fs::create_dir_all(dest)?;

  let mut files = 0;
  for entry in WalkDir::new(src).follow_links(true).min_depth(1) {
    let entry = entry.map_err(io::Error::from)?;
    let relative = entry
      .path()
      .strip_prefix(src)
      .map_err(io::Error::other)?;
    let target = dest.join(relative);

    if entry.file_type().is_dir() {
      fs::create_dir_all(&target)?;
    } else {
      fs::copy(entry.path(), &target)?;
      files += 1;
    }
  }
  Ok(files)
}

/// Replace `media_root` with the contents of `src`.
///
/// The existing tree is removed first; a failure part-way leaves
/// `media_root` partially populated.
pub fn replace_tree(src: &Path, media_root: &Path) -> io::Result<u64> {
  if media_root.exists() {
    fs::remove_dir_all(media_root)?;
  }
  copy_tree(src, media_root)
}
