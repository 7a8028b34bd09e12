use std::path::PathBuf;

xflags::xflags! {
    /// Command line front end for bassclef sites.
    cmd bcms {
        /// Log debug output to stderr.
        optional -v, --verbose

        /// Check that the tools a site build needs are installed.
        cmd test {}

        /// Write a starter `config.toml`.
        cmd init {
            /// Directory to write into; defaults to the current directory.
            optional dir: PathBuf
            /// Replace an existing configuration file.
            optional -f, --force
        }

        /// Hide numbered titles from pandoc; prints the page to stdout.
        cmd preprocess {
            required path: PathBuf
        }

        /// Fix up pandoc's HTML; reads stdin, writes stdout.
        cmd postprocess {
            /// Configuration file; defaults to `./config.toml` if present.
            optional -c, --config path: PathBuf
        }

        /// Check pages for broken references, shell, navigation and front matter.
        cmd check {
            /// Files or directories to check; defaults to the content directory.
            repeated paths: PathBuf
            /// Print the report as JSON.
            optional --json
            /// Configuration file; defaults to `./config.toml` if present.
            optional -c, --config path: PathBuf
        }
    }
}
