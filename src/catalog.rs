//! Sample catalog used to seed an empty library.

use crate::model::BookDetails;

/// One entry of the sample catalog
#[derive(Debug, Clone, Copy)]
struct BookSeed {
    /// Title shown to readers
    title: &'static str,
    /// Author name
    author: &'static str,
    /// Genre
    category: &'static str,
    /// ISBN as printed
    isbn: &'static str,
    /// Cover picture
    cover_image_url: &'static str,
}

/// Books added by `seed` on an empty catalog
const SAMPLE_BOOKS: &[BookSeed] = &[
    BookSeed {
        title: "To Kill a Mockingbird",
        author: "Harper Lee",
        category: "Classic",
        isbn: "978-0061120084",
        cover_image_url: "https://m.media-amazon.com/images/I/81a4kCNuH+L._AC_UF1000,1000_QL80_.jpg",
    },
    BookSeed {
        title: "1984",
        author: "George Orwell",
        category: "Dystopian",
        isbn: "978-0451524935",
        cover_image_url: "https://i.etsystatic.com/31513412/r/il/455f92/4081428546/il_1588xN.4081428546_dl25.jpg",
    },
    BookSeed {
        title: "The Great Gatsby",
        author: "F. Scott Fitzgerald",
        category: "Classic",
        isbn: "978-0743273565",
        cover_image_url: "https://m.media-amazon.com/images/I/81QuEGw8VPL._AC_UF1000,1000_QL80_.jpg",
    },
    BookSeed {
        title: "Pride and Prejudice",
        author: "Jane Austen",
        category: "Romance",
        isbn: "978-0141439518",
        cover_image_url: "https://almabooks.com/wp-content/uploads/2016/10/9781847493699.jpg",
    },
    BookSeed {
        title: "The Catcher in the Rye",
        author: "J.D. Salinger",
        category: "Fiction",
        isbn: "978-0316769488",
        cover_image_url: "https://m.media-amazon.com/images/I/7108sdEUEGL._SY522_.jpg",
    },
    BookSeed {
        title: "The Hobbit",
        author: "J.R.R. Tolkien",
        category: "Fantasy",
        isbn: "978-0345339683",
        cover_image_url: "https://m.media-amazon.com/images/I/91b0C2YNSrL._AC_UF1000,1000_QL80_.jpg",
    },
    BookSeed {
        title: "Fahrenheit 451",
        author: "Ray Bradbury",
        category: "Sci-Fi",
        isbn: "978-1451673319",
        cover_image_url: "https://m.media-amazon.com/images/I/715y6JcmQZL._UF1000,1000_QL80_.jpg",
    },
    BookSeed {
        title: "Dune",
        author: "Frank Herbert",
        category: "Sci-Fi",
        isbn: "978-0441013593",
        cover_image_url: "https://m.media-amazon.com/images/I/81ym3QUd3KL._AC_UF1000,1000_QL80_.jpg",
    },
    BookSeed {
        title: "The Lord of the Rings",
        author: "J.R.R. Tolkien",
        category: "Fantasy",
        isbn: "978-0618640157",
        cover_image_url: "https://m.media-amazon.com/images/I/81nV6x2ey4L._UF1000,1000_QL80_.jpg",
    },
    BookSeed {
        title: "Brave New World",
        author: "Aldous Huxley",
        category: "Dystopian",
        isbn: "978-0060850524",
        cover_image_url: "https://m.media-amazon.com/images/I/81zE42gT3xL._AC_UF1000,1000_QL80_.jpg",
    },
    BookSeed {
        title: "The Hitchhiker's Guide to the Galaxy",
        author: "Douglas Adams",
        category: "Sci-Fi",
        isbn: "978-0345391803",
        cover_image_url: "https://m.media-amazon.com/images/I/81BbVc2uRIL._SY522_.jpg",
    },
    BookSeed {
        title: "The Chronicles of Narnia",
        author: "C.S. Lewis",
        category: "Fantasy",
        isbn: "978-0066238500",
        cover_image_url: "https://m.media-amazon.com/images/I/81IsNyKSOmL.jpg",
    },
    BookSeed {
        title: "Moby Dick",
        author: "Herman Melville",
        category: "Adventure",
        isbn: "978-1503280786",
        cover_image_url: "https://upload.wikimedia.org/wikipedia/en/f/ff/Moby_dick.jpg?20200616022242",
    },
    BookSeed {
        title: "War and Peace",
        author: "Leo Tolstoy",
        category: "Historical",
        isbn: "978-1420959379",
        cover_image_url: "https://m.media-amazon.com/images/I/81W6BFaJJWL._SY522_.jpg",
    },
    BookSeed {
        title: "The Alchemist",
        author: "Paulo Coelho",
        category: "Fantasy",
        isbn: "978-0062315007",
        cover_image_url: "https://m.media-amazon.com/images/I/617lxveUjYL.jpg",
    },
    BookSeed {
        title: "One Hundred Years of Solitude",
        author: "Gabriel Garcia Marquez",
        category: "Magical Realism",
        isbn: "978-0060883287",
        cover_image_url: "https://m.media-amazon.com/images/I/81dy4cfPGuL.jpg",
    },
    BookSeed {
        title: "The Picture of Dorian Gray",
        author: "Oscar Wilde",
        category: "Gothic Fiction",
        isbn: "978-0141442464",
        cover_image_url: "https://d28hgpri8am2if.cloudfront.net/book_images/onix/cvr9781476788128/the-picture-of-dorian-gray-9781476788128_hr.jpg",
    },
    BookSeed {
        title: "Frankenstein",
        author: "Mary Shelley",
        category: "Gothic Fiction",
        isbn: "978-0486282114",
        cover_image_url: "https://m.media-amazon.com/images/I/91KEmBm2GVL.jpg",
    },
    BookSeed {
        title: "The Road",
        author: "Cormac McCarthy",
        category: "Post-Apocalyptic",
        isbn: "978-0307387899",
        cover_image_url: "https://m.media-amazon.com/images/I/51M7XGLQTBL.jpg",
    },
    BookSeed {
        title: "Slaughterhouse-Five",
        author: "Kurt Vonnegut",
        category: "Satire",
        isbn: "978-0385333849",
        cover_image_url: "https://m.media-amazon.com/images/I/91Jn9wb6ffL._UF1000,1000_QL80_.jpg",
    },
    BookSeed {
        title: "The Martian",
        author: "Andy Weir",
        category: "Sci-Fi",
        isbn: "978-0804139021",
        cover_image_url: "https://m.media-amazon.com/images/I/71Tp86ptAtL._UF894,1000_QL80_.jpg",
    },
    BookSeed {
        title: "Gone Girl",
        author: "Gillian Flynn",
        category: "Thriller",
        isbn: "978-0307588371",
        cover_image_url: "https://m.media-amazon.com/images/I/41l129t7JGL._UF1000,1000_QL80_.jpg",
    },
    BookSeed {
        title: "The Girl with the Dragon Tattoo",
        author: "Stieg Larsson",
        category: "Mystery",
        isbn: "978-0307949486",
        cover_image_url: "https://m.media-amazon.com/images/I/81YW99XIpJL._UF1000,1000_QL80_.jpg",
    },
    BookSeed {
        title: "Sapiens: A Brief History of Humankind",
        author: "Yuval Noah Harari",
        category: "Non-Fiction",
        isbn: "978-0062316097",
        cover_image_url: "https://m.media-amazon.com/images/I/713jIoMO3UL._AC_UF1000,1000_QL80_.jpg",
    },
    BookSeed {
        title: "Educated: A Memoir",
        author: "Tara Westover",
        category: "Memoir",
        isbn: "978-0399590504",
        cover_image_url: "https://m.media-amazon.com/images/I/71-4MkLN5jL.jpg",
    },
    BookSeed {
        title: "Atomic Habits",
        author: "James Clear",
        category: "Self-Help",
        isbn: "978-0735211292",
        cover_image_url: "https://m.media-amazon.com/images/I/81wgcld4wxL._AC_UF1000,1000_QL80_.jpg",
    },
    BookSeed {
        title: "Where the Crawdads Sing",
        author: "Delia Owens",
        category: "Fiction",
        isbn: "978-0735219090",
        cover_image_url: "https://m.media-amazon.com/images/I/81m1s4wIPML._AC_UF1000,1000_QL80_.jpg",
    },
    BookSeed {
        title: "The Silent Patient",
        author: "Alex Michaelides",
        category: "Thriller",
        isbn: "978-1250301697",
        cover_image_url: "https://m.media-amazon.com/images/I/81JJPDNlxSL.jpg",
    },
    BookSeed {
        title: "Project Hail Mary",
        author: "Andy Weir",
        category: "Sci-Fi",
        isbn: "978-0593135204",
        cover_image_url: "https://m.media-amazon.com/images/I/81zD9kaVW9L.jpg",
    },
    BookSeed {
        title: "Circe",
        author: "Madeline Miller",
        category: "Fantasy",
        isbn: "978-0316556347",
        cover_image_url: "https://images-na.ssl-images-amazon.com/images/S/compressed.photo.goodreads.com/books/1565909496i/35959740.jpg",
    },
];

/// Catalog details for every sample book
#[must_use]
pub fn sample_books() -> Vec<BookDetails> {
    SAMPLE_BOOKS
        .iter()
        .map(|seed| BookDetails {
            cover_image_url: seed.cover_image_url.to_string(),
            ..BookDetails::new(seed.title, seed.author, seed.category, seed.isbn)
        })
        .collect()
}
