//! Readable type names
//!
//! `std::any::type_name` yields fully qualified paths. Diagnostics and
//! default string conversion use the short form: every path segment is
//! stripped, generic arguments are kept.

/// Strip module paths from a fully qualified type name.
///
/// `alloc::vec::Vec<my_crate::store::Store>` becomes `Vec<Store>`.
pub fn demangle(full: &str) -> String {
    let mut out = String::with_capacity(full.len());
    let mut segment_start = 0;
    let mut chars = full.chars().peekable();
    while let Some(c) = chars.next() {
        if c == ':' && chars.peek() == Some(&':') {
            chars.next();
            out.truncate(segment_start);
        } else if c.is_alphanumeric() || c == '_' {
            out.push(c);
        } else {
            out.push(c);
            segment_start = out.len();
        }
    }
    out
}

/// Short name of `T`
pub fn short_type_name<T: ?Sized>() -> String {
    demangle(std::any::type_name::<T>())
}
