//! URL composition from a base URL, path segments, matrix and query parameters

use url::Url;

use crate::error::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Segment {
    name: String,
    matrix: Vec<(String, String)>,
}

/// Builds a request URL
///
/// Segments, matrix parameters and query parameters are all percent-encoded
/// as they are added. The URL is recomputed on every [`build`](Self::build).
///
/// ```
/// use fluent_http::UrlBuilder;
///
/// let mut url = UrlBuilder::new("http://h/api");
/// url.path("p")
///     .path(2011)
///     .matrix_param("author", "rob")
///     .matrix_param("country", "nz")
///     .path("foo")
///     .query_param("extra", "banana")
///     .query_param_opt("ignored", None::<&str>);
///
/// assert_eq!(
///     url.build(),
///     "http://h/api/p/2011;author=rob;country=nz/foo?extra=banana"
/// );
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlBuilder {
    base: Option<String>,
    base_matrix: Vec<(String, String)>,
    segments: Vec<Segment>,
    query: Vec<(String, String)>,
}

impl UrlBuilder {
    /// Start from a base URL
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: Some(base.into()),
            ..Default::default()
        }
    }

    /// Start without a base URL; one must be supplied before the URL is used
    pub fn without_base() -> Self {
        Self::default()
    }

    /// Base URL, if any
    pub fn base(&self) -> Option<&str> {
        self.base.as_deref()
    }

    /// Append path segments
    ///
    /// The value is split on `/`; each non-empty piece becomes one encoded
    /// segment, so `"hello/43"` appends two segments and `""` appends none.
    pub fn path(&mut self, path: impl ToString) -> &mut Self {
        let path = path.to_string();
        for piece in path.split('/').filter(|piece| !piece.is_empty()) {
            self.segments.push(Segment {
                name: urlencoding::encode(piece).into_owned(),
                matrix: Vec::new(),
            });
        }
        self
    }

    /// Attach `;name=value` to the most recently added path segment
    pub fn matrix_param(&mut self, name: impl AsRef<str>, value: impl ToString) -> &mut Self {
        let param = (
            urlencoding::encode(name.as_ref()).into_owned(),
            urlencoding::encode(&value.to_string()).into_owned(),
        );
        match self.segments.last_mut() {
            Some(segment) => segment.matrix.push(param),
            None => self.base_matrix.push(param),
        }
        self
    }

    /// Add a query parameter
    pub fn query_param(&mut self, name: impl AsRef<str>, value: impl ToString) -> &mut Self {
        self.query.push((
            urlencoding::encode(name.as_ref()).into_owned(),
            urlencoding::encode(&value.to_string()).into_owned(),
        ));
        self
    }

    /// Add a query parameter when `value` is `Some`; `None` adds nothing
    pub fn query_param_opt(
        &mut self,
        name: impl AsRef<str>,
        value: Option<impl ToString>,
    ) -> &mut Self {
        match value {
            Some(value) => self.query_param(name, value),
            None => self,
        }
    }

    /// Render the URL
    pub fn build(&self) -> String {
        let mut url = self
            .base
            .as_deref()
            .unwrap_or_default()
            .trim_end_matches('/')
            .to_owned();

        push_matrix(&mut url, &self.base_matrix);
        for segment in &self.segments {
            url.push('/');
            url.push_str(&segment.name);
            push_matrix(&mut url, &segment.matrix);
        }

        for (index, (name, value)) in self.query.iter().enumerate() {
            url.push(if index == 0 { '?' } else { '&' });
            url.push_str(name);
            url.push('=');
            url.push_str(value);
        }
        url
    }

    /// Render and parse the URL
    pub fn to_url(&self) -> Result<Url, Error> {
        if self.base.is_none() {
            return Err(Error::InvalidRequest(
                "no base URL configured and no URL set on the request".into(),
            ));
        }
        let url = self.build();
        Url::parse(&url).map_err(|e| Error::InvalidRequest(format!("invalid URL {url}: {e}")))
    }
}

fn push_matrix(url: &mut String, params: &[(String, String)]) {
    for (name, value) in params {
        url.push(';');
        url.push_str(name);
        url.push('=');
        url.push_str(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matrix_params_attach_to_preceding_segment() {
        let mut url = UrlBuilder::new("http://h/api");
        url.path("a").matrix_param("m1", "x").path("b").matrix_param("m2", "y");

        assert_eq!(url.build(), "http://h/api/a;m1=x/b;m2=y");
    }

    #[test]
    fn test_matrix_params_on_segment_from_multi_part_path() {
        let mut url = UrlBuilder::new("http://127.0.0.1:8887");
        url.path("hello/withMatrix/2011")
            .matrix_param("author", "rob")
            .matrix_param("country", "nz")
            .path("foo")
            .query_param("extra", "banana");

        assert_eq!(
            url.build(),
            "http://127.0.0.1:8887/hello/withMatrix/2011;author=rob;country=nz/foo?extra=banana"
        );
    }

    #[test]
    fn test_none_query_param_is_omitted() {
        let mut url = UrlBuilder::new("http://h");
        let missing: Option<&str> = None;
        url.path("hello")
            .query_param_opt("foo", None::<String>)
            .query_param("otherParam", "other")
            .query_param_opt("bar", missing)
            .query_param_opt("page", Some(2));

        assert_eq!(url.build(), "http://h/hello?otherParam=other&page=2");

        let mut only_none = UrlBuilder::new("http://h");
        only_none.path("x").query_param_opt("foo", None::<i32>);
        assert_eq!(only_none.build(), "http://h/x");
    }

    #[test]
    fn test_duplicate_query_params_are_kept() {
        let mut url = UrlBuilder::new("http://h");
        url.query_param("tag", "a").query_param("tag", "b");
        assert_eq!(url.build(), "http://h?tag=a&tag=b");
    }

    #[test]
    fn test_segments_and_params_are_encoded() {
        let mut url = UrlBuilder::new("http://h/");
        url.path("a b")
            .matrix_param("who", "r&d")
            .query_param("q", "x=y z");

        assert_eq!(url.build(), "http://h/a%20b;who=r%26d?q=x%3Dy%20z");
    }

    #[test]
    fn test_empty_segments_are_ignored() {
        let mut url = UrlBuilder::new("http://h/api/");
        url.path("").path("//hello//").path(43);
        assert_eq!(url.build(), "http://h/api/hello/43");
    }

    #[test]
    fn test_matrix_without_segment_attaches_to_base() {
        let mut url = UrlBuilder::new("http://h/api");
        url.matrix_param("v", 2).path("x");
        assert_eq!(url.build(), "http://h/api;v=2/x");
    }

    #[test]
    fn test_to_url_requires_base() {
        let mut url = UrlBuilder::without_base();
        url.path("hello");
        assert!(matches!(url.to_url(), Err(Error::InvalidRequest(_))));

        let parsed = UrlBuilder::new("http://h/api")
            .path("p")
            .matrix_param("k", "v")
            .to_url()
            .expect("Valid URL");
        assert_eq!(parsed.path(), "/api/p;k=v");
    }
}
