//! Sibling context
//!
//! The files sharing a directory with the file being checked. Rebuilt for
//! every file from the scanned list; nothing here touches the disk.

use std::path::{ Path, PathBuf };


/// A file and the other candidates in the same directory.
#[derive( Debug, Clone )]
pub struct SiblingSet<'a> {
    target: &'a Path,
    others: Vec<&'a Path>,
}


impl<'a> SiblingSet<'a> {
    /// Collects the entries of `files` that share `target`'s parent.
    pub fn new( files: &'a [PathBuf], target: &'a Path ) -> Self {
        let parent = target.parent();
        let others = files
            .iter()
            .map( PathBuf::as_path )
            .filter( |f| *f != target && f.parent() == parent )
            .collect();

        Self { target, others }
    }


    /// The other files in the directory.
    pub fn others( &self ) -> &[&'a Path] {
        &self.others
    }


    /// Number of candidate files in the directory, the target included.
    pub fn folder_size( &self ) -> usize {
        self.others.len() + 1
    }


    /// Number of files in the directory, the target included, whose name
    /// starts with `prefix`.
    pub fn count_named_with_prefix( &self, prefix: &str ) -> usize {
        std::iter::once( self.target )
            .chain( self.others.iter().copied() )
            .filter( |p| {
                p.file_name()
                    .and_then( |n| n.to_str() )
                    .is_some_and( |n| n.starts_with( prefix ) )
            })
            .count()
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    fn files() -> Vec<PathBuf> {
        [
            "/m/Al Green/[1972] I'm Still in Love with You/01 - I'm Still in Love with You.mp3",
            "/m/Al Green/[1972] I'm Still in Love with You/02 - I'm Glad You're Mine.mp3",
            "/m/Al Green/[1972] I'm Still in Love with You/02 - Love and Happiness.mp3",
            "/m/Al Green/[1972] I'm Still in Love with You/sub/01 - Other.mp3",
            "/m/Al Green/Al Green - Let's Stay Together.mp3",
        ]
        .into_iter()
        .map( PathBuf::from )
        .collect()
    }


    #[test]
    fn test_others_excludes_target_and_other_dirs() {
        let files = files();
        let set = SiblingSet::new( &files, &files[ 0 ] );
        assert_eq!( set.others(), &[ files[ 1 ].as_path(), files[ 2 ].as_path() ] );
        assert_eq!( set.folder_size(), 3 );
    }


    #[test]
    fn test_lonely_file() {
        let files = files();
        let set = SiblingSet::new( &files, &files[ 4 ] );
        assert!( set.others().is_empty() );
        assert_eq!( set.folder_size(), 1 );
    }


    #[test]
    fn test_count_named_with_prefix_includes_target() {
        let files = files();
        let set = SiblingSet::new( &files, &files[ 0 ] );
        assert_eq!( set.count_named_with_prefix( "01 - " ), 1 );
        assert_eq!( set.count_named_with_prefix( "02 - " ), 2 );
        assert_eq!( set.count_named_with_prefix( "03 - " ), 0 );
    }
}
