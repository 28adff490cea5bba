//! Useful macros.

/// Time the given operations and push the time to the given `Vec<(&str, Duration)>`.
macro_rules! time {
    ($timers:ident, $label:literal, $expr:expr) => {{
        let start = std::time::Instant::now();
        let result = $expr;
        let duration = std::time::Instant::now() - start;
        $timers.push(($label, duration));
        result
    }};
}

/// Given an ordered list of path components, combine them into a path string. Trailing slashes on
/// a component are dropped so that `dir!("/opt/", "lib")` is `/opt/lib`.
macro_rules! dir {
    ($first:expr $(, $part:expr)* $(,)?) => {{
        #[allow(unused_mut)]
        let mut path = String::from($first);

        $(
            while path.len() > 1 && path.ends_with('/') {
                path.pop();
            }
            if !path.ends_with('/') {
                path.push('/');
            }
            path.push_str(String::from($part).trim_start_matches('/'));
        )*

        path
    }}
}

/// Run a bunch of commands with the same shell and optionally the same CWD.
macro_rules! with_shell {
    ($shell:ident $(in $cwd:expr)? => $($cmd:expr),+ $(,)?) => {{
        let cmds = vec![$($cmd),+];

        $(
            let cmds: Vec<_> = cmds.into_iter().map(|cmd| cmd.cwd($cwd)).collect();
        )?

        for cmd in cmds.into_iter() {
            $shell.run(cmd)?;
        }
    }}
}

#[cfg(test)]
mod test {
    #[test]
    fn dir_joins_components() {
        assert_eq!(dir!("/opt", "apache-hive-3.1.0-bin", "lib"), "/opt/apache-hive-3.1.0-bin/lib");
        assert_eq!(dir!("/dbfs/databricks/", "jars"), "/dbfs/databricks/jars");
        assert_eq!(dir!("/", "opt"), "/opt");
        assert_eq!(dir!("scripts"), "scripts");
    }
}
