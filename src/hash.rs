/// A streaming hash function producing an `N` byte digest.
///
/// `finalize` consumes the hasher, so a finished state can never be fed
/// more data.
pub trait Hasher<const N: usize>: Default {
    fn update(&mut self, data: &[u8]);

    fn finalize(self) -> [u8; N];

    fn digest_message(message: &[u8]) -> [u8; N] {
        let mut hasher = Self::default();
        hasher.update(message);
        hasher.finalize()
    }

    /// Feed each chunk in order, then finalize.
    fn digest_chunks<'a, I>(chunks: I) -> [u8; N]
    where
        I: IntoIterator<Item = &'a [u8]>,
    {
        let mut hasher = Self::default();
        for chunk in chunks {
            hasher.update(chunk);
        }
        hasher.finalize()
    }
}
