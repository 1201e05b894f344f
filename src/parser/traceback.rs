//! Traceback boundary scanning for query source attribution.
//!
//! A captured query carries the raw call-stack text at execution time.
//! The line that "caused" the query is ambiguous: the innermost frames sit
//! inside the ORM, the outermost inside the framework. The scan walks the
//! stack innermost-first and prefers the first frame inside the
//! application's own source, falling back to the first frame just outside
//! the ORM execution layer.

use crate::parser::schema::CodeLocation;
use log::debug;

/// Find the most relevant source line for a query.
///
/// **Public** - main entry point for traceback scanning
///
/// # Arguments
/// * `traceback` - raw traceback lines, outermost frame first
/// * `orm_marker` - path fragment identifying ORM-layer frames
/// * `app_root` - application source root; empty disables app matching
///
/// # Returns
/// The preferred location, or `None` if no frame qualifies. A missing
/// location is not an error; the query simply reports no source.
pub fn locate_query_source(
    traceback: &[String],
    orm_marker: &str,
    app_root: &str,
) -> Option<CodeLocation> {
    let mut previous_line = "";
    let mut boundary_candidate: Option<CodeLocation> = None;
    let mut app_candidate: Option<CodeLocation> = None;

    // Innermost frame first, tracking the previously examined line.
    for line in traceback.iter().rev() {
        if boundary_candidate.is_none()
            && previous_line.contains(orm_marker)
            && !line.contains(orm_marker)
        {
            // First frame just outside the ORM execution layer
            boundary_candidate = parse_traceback_line(line);
        }

        if !app_root.is_empty() && line.contains(app_root) {
            app_candidate = parse_traceback_line(line);
            if app_candidate.is_some() {
                break;
            }
        }

        previous_line = line;
    }

    if app_candidate.is_none() && boundary_candidate.is_none() {
        debug!("No application or ORM-boundary frame found in traceback");
    }

    app_candidate.or(boundary_candidate)
}

/// Parse one traceback line of the fixed layout
/// `File "<path>", line <n>, in <function>` followed by the source text.
///
/// A line that does not match contributes no candidate; the scan continues.
pub fn parse_traceback_line(line: &str) -> Option<CodeLocation> {
    let rest = line.trim_start().strip_prefix("File \"")?;
    let (file, rest) = rest.split_once('"')?;
    let rest = rest.strip_prefix(", line ")?;
    let (line_number, rest) = rest.split_once(", in ")?;
    let line_number: u32 = line_number.trim().parse().ok()?;

    let mut parts = rest.trim_start().splitn(2, char::is_whitespace);
    let function = parts.next()?.trim();
    if function.is_empty() {
        return None;
    }
    let source_text = parts.next().unwrap_or("").trim();

    Some(CodeLocation {
        file: file.to_string(),
        function: function.to_string(),
        line: line_number,
        source_text: source_text.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORM_MARKER: &str = "django/db/models/query.py";

    fn frame(path: &str, line: u32, function: &str, source: &str) -> String {
        format!("  File \"{path}\", line {line}, in {function}\n    {source}")
    }

    #[test]
    fn test_parse_traceback_line() {
        let line = frame("/app/myapp/views.py", 42, "get_foos", "return Foo.objects.all()");
        let loc = parse_traceback_line(&line).unwrap();
        assert_eq!(loc.file, "/app/myapp/views.py");
        assert_eq!(loc.line, 42);
        assert_eq!(loc.function, "get_foos");
        assert_eq!(loc.source_text, "return Foo.objects.all()");
    }

    #[test]
    fn test_parse_traceback_line_without_source() {
        let loc = parse_traceback_line("  File \"/app/views.py\", line 3, in handler").unwrap();
        assert_eq!(loc.function, "handler");
        assert_eq!(loc.source_text, "");
    }

    #[test]
    fn test_parse_traceback_line_rejects_other_layouts() {
        assert!(parse_traceback_line("").is_none());
        assert!(parse_traceback_line("Traceback (most recent call last):").is_none());
        assert!(parse_traceback_line("  File \"/a.py\", line x, in f").is_none());
    }

    #[test]
    fn test_prefers_app_root_frame() {
        // Outermost first; the scan runs bottom-up.
        let traceback = vec![
            frame("/usr/lib/python/wsgi.py", 10, "run", "handler()"),
            frame("/srv/myproject/myapp/views.py", 42, "get_foos", "list(Foo.objects.all())"),
            frame(&format!("/usr/lib/{ORM_MARKER}"), 1100, "_fetch_all", "self._result_cache = list(...)"),
            frame(&format!("/usr/lib/{ORM_MARKER}"), 900, "execute", "cursor.execute(sql)"),
        ];

        let loc = locate_query_source(&traceback, ORM_MARKER, "/srv/myproject").unwrap();
        assert_eq!(loc.line, 42);
        assert_eq!(loc.function, "get_foos");
    }

    #[test]
    fn test_falls_back_to_first_non_orm_frame() {
        let traceback = vec![
            frame("/usr/lib/python/wsgi.py", 10, "run", "handler()"),
            frame("/usr/lib/some_library/helpers.py", 77, "fetch", "qs.count()"),
            frame(&format!("/usr/lib/{ORM_MARKER}"), 900, "execute", "cursor.execute(sql)"),
        ];

        // App root configured but never present: boundary frame wins.
        let loc = locate_query_source(&traceback, ORM_MARKER, "/srv/elsewhere").unwrap();
        assert_eq!(loc.line, 77);
        assert_eq!(loc.function, "fetch");
    }

    #[test]
    fn test_app_frame_beats_later_non_orm_frame() {
        // Innermost-first positions: frame 2 is under the app root, frame 4
        // is a non-ORM boundary frame. Frame 2 must win.
        let traceback = vec![
            frame("/usr/lib/some_library/helpers.py", 77, "fetch", "qs.count()"),
            frame(&format!("/usr/lib/{ORM_MARKER}"), 1100, "_fetch_all", "list(...)"),
            frame("/srv/myproject/myapp/views.py", 42, "get_foos", "Foo.objects.all()"),
            frame(&format!("/usr/lib/{ORM_MARKER}"), 900, "execute", "cursor.execute(sql)"),
        ];

        let loc = locate_query_source(&traceback, ORM_MARKER, "/srv/myproject").unwrap();
        assert_eq!(loc.function, "get_foos");
    }

    #[test]
    fn test_no_candidate_yields_none() {
        let traceback = vec![
            frame(&format!("/usr/lib/{ORM_MARKER}"), 1100, "_fetch_all", "list(...)"),
            frame(&format!("/usr/lib/{ORM_MARKER}"), 900, "execute", "cursor.execute(sql)"),
        ];
        assert!(locate_query_source(&traceback, ORM_MARKER, "").is_none());
    }

    #[test]
    fn test_empty_app_root_never_matches() {
        let traceback = vec![frame("/srv/app/views.py", 1, "f", "x()")];
        // Empty app root must not match every line.
        assert!(locate_query_source(&traceback, ORM_MARKER, "").is_none());
    }
}
