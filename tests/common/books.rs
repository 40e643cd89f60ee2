//! Nine-book sample corpus
//!
//! Three books are from the USA; only To Kill a Mockingbird rates above 4.8.

use selfquery::{AttributeSpec, Metadata, MetadataValue, SchemaRegistry, ValueType};

pub const CONTENT_DESCRIPTION: &str = "Brief summary of a book";

pub struct Book {
    pub title: &'static str,
    pub author: &'static str,
    pub year: i64,
    pub genre: &'static [&'static str],
    pub rating: f64,
    pub language: &'static str,
    pub country: &'static str,
    pub summary: &'static str,
}

pub const BOOKS: &[Book] = &[
    Book {
        title: "The Namesake",
        author: "Jhumpa Lahiri",
        year: 2003,
        genre: &["literary fiction", "family saga"],
        rating: 4.3,
        language: "English",
        country: "USA",
        summary: "A Bengali family settles in Massachusetts and their son wrestles with the \
                  name his father gave him and the two cultures he belongs to.",
    },
    Book {
        title: "Gone Girl",
        author: "Gillian Flynn",
        year: 2012,
        genre: &["thriller", "mystery"],
        rating: 4.1,
        language: "English",
        country: "USA",
        summary: "On their fifth anniversary a wife vanishes and her husband becomes the prime \
                  suspect in a twisting mystery of marriage and lies.",
    },
    Book {
        title: "To Kill a Mockingbird",
        author: "Harper Lee",
        year: 1960,
        genre: &["classic", "legal drama"],
        rating: 4.9,
        language: "English",
        country: "USA",
        summary: "In a small Alabama town a lawyer defends a black man accused of a crime he \
                  did not commit, seen through the eyes of his young daughter.",
    },
    Book {
        title: "One Hundred Years of Solitude",
        author: "Gabriel García Márquez",
        year: 1967,
        genre: &["magical realism"],
        rating: 4.7,
        language: "Spanish",
        country: "Colombia",
        summary: "Seven generations of the Buendía family rise and fall in the mythical town \
                  of Macondo, where miracles and ghosts are part of daily life.",
    },
    Book {
        title: "The Alchemist",
        author: "Paulo Coelho",
        year: 1988,
        genre: &["fable", "adventure"],
        rating: 4.2,
        language: "Portuguese",
        country: "Brazil",
        summary: "A shepherd boy leaves Spain on a gripping adventure across the desert to \
                  find treasure near the pyramids and learns to follow his dream.",
    },
    Book {
        title: "Norwegian Wood",
        author: "Haruki Murakami",
        year: 1987,
        genre: &["romance", "coming-of-age"],
        rating: 4.0,
        language: "Japanese",
        country: "Japan",
        summary: "A student in Tokyo remembers his first love and the grief and loneliness of \
                  growing up in the late sixties.",
    },
    Book {
        title: "Things Fall Apart",
        author: "Chinua Achebe",
        year: 1958,
        genre: &["historical fiction", "tragedy"],
        rating: 4.6,
        language: "English",
        country: "Nigeria",
        summary: "A proud Igbo wrestler watches his village and his own life unravel as \
                  colonial missionaries arrive.",
    },
    Book {
        title: "The Little Prince",
        author: "Antoine de Saint-Exupéry",
        year: 1943,
        genre: &["fable", "children's"],
        rating: 4.8,
        language: "French",
        country: "France",
        summary: "A pilot stranded in the desert meets a small prince from another planet who \
                  tells of a rose, a fox and what matters most.",
    },
    Book {
        title: "Crime and Punishment",
        author: "Fyodor Dostoevsky",
        year: 1866,
        genre: &["psychological", "philosophical"],
        rating: 4.7,
        language: "Russian",
        country: "Russia",
        summary: "A poor student in Saint Petersburg commits a murder and is consumed by guilt \
                  while a patient detective closes in.",
    },
];

pub fn book_schema() -> SchemaRegistry {
    SchemaRegistry::from_attributes(vec![
        AttributeSpec::new("title", "The title of the book", ValueType::String),
        AttributeSpec::new("author", "The author of the book", ValueType::String),
        AttributeSpec::new("year", "The year the book was published", ValueType::Integer),
        AttributeSpec::new("genre", "The genres of the book", ValueType::StringList),
        AttributeSpec::new("rating", "The average reader rating, 1-5", ValueType::Float),
        AttributeSpec::new("language", "The original language of the book", ValueType::String),
        AttributeSpec::new("country", "The country the book comes from", ValueType::String),
    ])
    .expect("book schema is valid")
}

impl Book {
    pub fn metadata(&self) -> Metadata {
        let mut m = Metadata::new();
        m.insert("title".into(), MetadataValue::from(self.title));
        m.insert("author".into(), MetadataValue::from(self.author));
        m.insert("year".into(), MetadataValue::Integer(self.year));
        m.insert("genre".into(), MetadataValue::from(self.genre.to_vec()));
        m.insert("rating".into(), MetadataValue::Float(self.rating));
        m.insert("language".into(), MetadataValue::from(self.language));
        m.insert("country".into(), MetadataValue::from(self.country));
        m
    }
}

/// `(content, metadata)` pairs ready for `add_documents`.
pub fn book_documents() -> Vec<(String, Metadata)> {
    BOOKS
        .iter()
        .map(|b| (format!("{}: {}", b.title, b.summary), b.metadata()))
        .collect()
}
